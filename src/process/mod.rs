//! Cross-platform read-only access to another process's virtual memory.
//!
//! [`MemorySource`] is the abstraction the scanner is built against; it is
//! implemented by a real backend per target platform
//! ([`linux::LinuxProcess`] or [`windows::WindowsProcess`]) and, under
//! `#[cfg(test)]`, by [`mock::MockProcess`], so the scanning algorithm in
//! [`crate::scanner`] can be exercised without a live OS process.

use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(test)]
pub mod mock;

/// Errors from opening or reading a target process's memory.
#[derive(Debug, Error)]
pub enum Error {
    /// The process could not be opened, typically due to insufficient privileges.
    #[error("permission denied opening process {0}")]
    PermissionDenied(u32),

    /// No process with the given id exists.
    #[error("no such process: {0}")]
    NoSuchProcess(u32),

    /// A read of `length` bytes at `address` failed (unmapped or unreadable region).
    #[error("failed to read {length} bytes at address {address:#x}")]
    ReadFailed {
        /// Address the read was attempted at.
        address: u64,
        /// Number of bytes requested.
        length: usize,
    },

    /// The target process's memory map could not be enumerated.
    #[error("failed to enumerate process memory: {0}")]
    EnumerationFailed(String),
}

/// Result type for [`MemorySource`] operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A read-only view of a running process's address space.
///
/// Implementations own whatever OS handle is needed to read the target and
/// release it on [`Drop`].
pub trait MemorySource: Sized {
    /// Opens a view onto the process identified by `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchProcess`] or [`Error::PermissionDenied`].
    fn open(pid: u32) -> Result<Self>;

    /// Reads exactly `length` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFailed`] if any part of the range is unmapped
    /// or unreadable.
    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>>;

    /// Returns the absolute addresses of every non-overlapping occurrence
    /// of `needle` across all readable memory regions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnumerationFailed`] if the process's memory map
    /// could not be read at all. Individual unreadable regions are skipped,
    /// not treated as a fatal error.
    fn search_bytes(&self, needle: &[u8]) -> Result<Vec<u64>>;
}

/// Finds every non-overlapping occurrence of `needle` in `haystack`,
/// returning byte offsets relative to the start of `haystack`.
///
/// Shared by every [`MemorySource`] backend so the scanning semantics
/// (non-overlapping, left-to-right) are identical regardless of how the
/// bytes were obtained.
#[must_use]
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let mut offsets = Vec::new();
    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        if &haystack[start..start + needle.len()] == needle {
            offsets.push(start);
            start += needle.len();
        } else {
            start += 1;
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_non_overlapping_occurrences() {
        let haystack = b"aaaa";
        assert_eq!(find_all(haystack, b"aa"), vec![0, 2]);
    }

    #[test]
    fn finds_nothing_for_absent_needle() {
        let haystack = b"hello world";
        assert!(find_all(haystack, b"xyz").is_empty());
    }

    #[test]
    fn empty_needle_finds_nothing() {
        assert!(find_all(b"hello", b"").is_empty());
    }
}
