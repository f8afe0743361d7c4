//! Windows backend for [`super::MemorySource`].
//!
//! Enumerates committed, readable regions with `VirtualQueryEx` and reads
//! their bytes with `ReadProcessMemory`, via `windows-sys`'s raw bindings
//! (the same low-level-FFI style `windows-sys` is used for elsewhere in
//! this ecosystem, rather than the higher-level `windows` crate, since
//! only a handful of calls are needed here).

use std::mem::MaybeUninit;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows_sys::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows_sys::Win32::System::Memory::{
    VirtualQueryEx, MEMORY_BASIC_INFORMATION, MEM_COMMIT, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS, PAGE_READONLY,
    PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_VM_READ};

use super::{Error, MemorySource, Result};

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;

/// A read-only handle onto a Windows process's memory.
pub struct WindowsProcess {
    handle: HANDLE,
}

// SAFETY: the underlying `HANDLE` is only ever used for read-only memory
// queries, which the Windows API documents as safe to issue from any
// thread.
unsafe impl Send for WindowsProcess {}
unsafe impl Sync for WindowsProcess {}

fn is_readable(protect: u32) -> bool {
    if protect & PAGE_GUARD != 0 || protect == PAGE_NOACCESS {
        return false;
    }
    matches!(
        protect & 0xFF,
        PAGE_READONLY
            | PAGE_READWRITE
            | PAGE_WRITECOPY
            | PAGE_EXECUTE_READ
            | PAGE_EXECUTE_READWRITE
            | PAGE_EXECUTE_WRITECOPY
    )
}

impl MemorySource for WindowsProcess {
    fn open(pid: u32) -> Result<Self> {
        // SAFETY: FFI call with no preconditions beyond a valid pid, which
        // the OS itself validates.
        let handle = unsafe { OpenProcess(PROCESS_VM_READ, 0, pid) };
        if handle.is_null() {
            // SAFETY: no preconditions.
            let code = unsafe { GetLastError() };
            return Err(match code {
                ERROR_ACCESS_DENIED => Error::PermissionDenied(pid),
                ERROR_INVALID_PARAMETER => Error::NoSuchProcess(pid),
                other => Error::EnumerationFailed(format!("OpenProcess failed: {other}")),
            });
        }
        Ok(Self { handle })
    }

    fn read(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; length];
        let mut read = 0_usize;

        // SAFETY: `buf` is valid for `length` bytes for the duration of
        // this call; `address` is an arbitrary value in the target's
        // address space that the kernel validates and may reject.
        let ok = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const _,
                buf.as_mut_ptr().cast(),
                length,
                &mut read,
            )
        };

        if ok == 0 || read != length {
            return Err(Error::ReadFailed { address, length });
        }
        Ok(buf)
    }

    fn search_bytes(&self, needle: &[u8]) -> Result<Vec<u64>> {
        const CHUNK_SIZE: usize = 4 * 1024 * 1024;

        let mut found = std::collections::BTreeSet::new();
        let mut address: usize = 0;

        loop {
            let mut info = MaybeUninit::<MEMORY_BASIC_INFORMATION>::zeroed();
            // SAFETY: `info` is a valid, writable `MEMORY_BASIC_INFORMATION`
            // buffer of the size passed in.
            let written = unsafe {
                VirtualQueryEx(
                    self.handle,
                    address as *const _,
                    info.as_mut_ptr(),
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 {
                break;
            }
            // SAFETY: `VirtualQueryEx` reported success, so `info` is initialized.
            let info = unsafe { info.assume_init() };

            let region_start = info.BaseAddress as usize;
            let region_size = info.RegionSize;
            let next_address = region_start.saturating_add(region_size);

            if info.State == MEM_COMMIT && is_readable(info.Protect) {
                let step = CHUNK_SIZE
                    .saturating_sub(needle.len().saturating_sub(1))
                    .max(1);
                let mut offset = 0_usize;
                while offset < region_size {
                    let chunk_len = CHUNK_SIZE.min(region_size - offset);
                    if let Ok(bytes) = self.read((region_start + offset) as u64, chunk_len) {
                        for hit in super::find_all(&bytes, needle) {
                            found.insert((region_start + offset + hit) as u64);
                        }
                    }
                    offset += step;
                }
            }

            if next_address <= address {
                break;
            }
            address = next_address;
        }

        Ok(found.into_iter().collect())
    }
}

impl Drop for WindowsProcess {
    fn drop(&mut self) {
        // SAFETY: `self.handle` was returned by a successful `OpenProcess`
        // and is closed at most once.
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
