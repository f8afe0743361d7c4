//! Linux backend for [`super::MemorySource`].
//!
//! Reads the target's mapped regions from `/proc/<pid>/maps` and its bytes
//! via `process_vm_readv(2)`, which needs no open file descriptor on the
//! target and (subject to `ptrace` permissions) works across processes
//! owned by the same user.

use std::fs;
use std::io;

use super::{Error, MemorySource, Result};

/// One readable region of the target's address space.
struct Region {
    start: u64,
    end: u64,
}

/// A read-only handle onto a Linux process's memory.
pub struct LinuxProcess {
    pid: u32,
}

impl LinuxProcess {
    /// Parses the readable regions out of `/proc/<pid>/maps`.
    fn regions(&self) -> Result<Vec<Region>> {
        let path = format!("/proc/{}/maps", self.pid);
        let contents = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NoSuchProcess(self.pid),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(self.pid),
            _ => Error::EnumerationFailed(e.to_string()),
        })?;

        let mut regions = Vec::new();
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let Some(range) = fields.next() else {
                continue;
            };
            let Some(perms) = fields.next() else {
                continue;
            };
            if !perms.starts_with('r') {
                continue;
            }
            let Some((start, end)) = range.split_once('-') else {
                continue;
            };
            let (Ok(start), Ok(end)) = (
                u64::from_str_radix(start, 16),
                u64::from_str_radix(end, 16),
            ) else {
                continue;
            };
            if end > start {
                regions.push(Region { start, end });
            }
        }
        Ok(regions)
    }

    /// Reads `length` bytes at `address` via `process_vm_readv`, tolerating
    /// short or failed reads by returning `None` rather than an error; the
    /// scanner treats individual unreadable addresses as expected noise.
    fn try_read(&self, address: u64, length: usize) -> Option<Vec<u8>> {
        let mut buf = vec![0_u8; length];

        let local_iov = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: length,
        };
        let remote_iov = libc::iovec {
            iov_base: address as *mut libc::c_void,
            iov_len: length,
        };

        // SAFETY: `local_iov` points at `buf`, which is valid for `length`
        // bytes for the duration of this call; `remote_iov` merely
        // describes a range in the target's address space that the kernel
        // validates on our behalf and may legitimately reject.
        let read = unsafe {
            libc::process_vm_readv(
                self.pid as libc::pid_t,
                &local_iov,
                1,
                &remote_iov,
                1,
                0,
            )
        };

        if read == length as isize {
            Some(buf)
        } else {
            None
        }
    }
}

impl MemorySource for LinuxProcess {
    fn open(pid: u32) -> Result<Self> {
        let proc_dir = format!("/proc/{pid}");
        if !std::path::Path::new(&proc_dir).exists() {
            return Err(Error::NoSuchProcess(pid));
        }
        Ok(Self { pid })
    }

    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        self.try_read(address, length)
            .ok_or(Error::ReadFailed { address, length })
    }

    fn search_bytes(&self, needle: &[u8]) -> Result<Vec<u64>> {
        // 4 MiB chunks with a one-needle-length overlap, so a match
        // straddling a chunk boundary is still found, without requiring
        // the whole (potentially gigabyte-sized) region in memory at once.
        const CHUNK_SIZE: usize = 4 * 1024 * 1024;

        let mut found = std::collections::BTreeSet::new();
        for region in self.regions()? {
            let region_size = (region.end - region.start) as usize;
            let step = CHUNK_SIZE.saturating_sub(needle.len().saturating_sub(1)).max(1);

            let mut offset = 0_usize;
            while offset < region_size {
                let chunk_len = CHUNK_SIZE.min(region_size - offset);
                let Some(bytes) = self.try_read(region.start + offset as u64, chunk_len) else {
                    offset += step;
                    continue;
                };
                for hit in super::find_all(&bytes, needle) {
                    found.insert(region.start + offset as u64 + hit as u64);
                }
                offset += step;
            }
        }
        Ok(found.into_iter().collect())
    }
}
