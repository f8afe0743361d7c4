//! In-memory [`super::MemorySource`] used only by tests.
//!
//! Models a target process as a single flat buffer starting at a
//! configurable base address, so the scanning algorithm in
//! [`crate::scanner`] can be exercised deterministically without a real OS
//! process.

use super::{Error, MemorySource, Result};

/// A synthetic process image: one contiguous, fully readable region.
pub struct MockProcess {
    base: u64,
    bytes: Vec<u8>,
}

impl MockProcess {
    /// Creates a mock process whose memory is `bytes`, mapped starting at `base`.
    #[must_use]
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// Writes `value` at `address`, growing the backing buffer if needed.
    ///
    /// Used by tests to place synthetic string objects and pointers at
    /// specific addresses without hand-computing every byte of the image
    /// up front.
    pub fn write(&mut self, address: u64, value: &[u8]) {
        let offset = (address - self.base) as usize;
        let end = offset + value.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(value);
    }
}

impl MemorySource for MockProcess {
    fn open(_pid: u32) -> Result<Self> {
        // Mocks are always constructed directly via `MockProcess::new`;
        // `open` exists only to satisfy the trait for code generic over it.
        Err(Error::NoSuchProcess(_pid))
    }

    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        if address < self.base {
            return Err(Error::ReadFailed { address, length });
        }
        let offset = (address - self.base) as usize;
        let end = offset
            .checked_add(length)
            .ok_or(Error::ReadFailed { address, length })?;
        self.bytes
            .get(offset..end)
            .map(<[u8]>::to_vec)
            .ok_or(Error::ReadFailed { address, length })
    }

    fn search_bytes(&self, needle: &[u8]) -> Result<Vec<u64>> {
        Ok(super::find_all(&self.bytes, needle)
            .into_iter()
            .map(|offset| self.base + offset as u64)
            .collect())
    }
}
