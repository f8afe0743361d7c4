//! Cross-process memory scanner.
//!
//! Drives the whole recovery: for each requested archive, loads its
//! envelope via [`crate::multifile`], finds the archive's filename in the
//! target process's memory via [`crate::process::MemorySource`], reconstructs
//! nearby C++ standard-library string objects under the known layouts, and
//! hands every candidate to [`crate::multifile::Archive::is_password`].
//! Confirmed hits, warnings and a single terminal event are streamed back
//! over an unbounded channel, mirroring the event-channel shape
//! `src/remote.rs` already used for the teacher's own connect protocol.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{Error, ErrorKind};
use crate::events::Event;
use crate::multifile::Archive;
use crate::process::MemorySource;

#[cfg(target_os = "linux")]
use crate::process::linux::LinuxProcess as PlatformProcess;
#[cfg(target_os = "windows")]
use crate::process::windows::WindowsProcess as PlatformProcess;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
compile_error!("mfpass's memory scanner is only implemented for Linux and Windows");

/// Offset, in bytes, from a recovered password's string-object address at
/// which `ScanWorker.py` observed the multifile's version fields `(1, 1)`:
/// an empirical corroboration check specific to the game builds the
/// original tool targeted, not a general invariant of the multifile format.
/// Used only by [`find_passwords_from_timestamp`], which inherits the
/// original's fixed-offset discovery strategy verbatim.
const VERSION_CHECK_OFFSET: i64 = 1336;

/// Offset, in bytes, from a timestamp/scale-factor match to the
/// corresponding password string object, per `ScanWorker.py`.
const TIMESTAMP_TO_PASSWORD_OFFSET: i64 = 40;

/// Byte range considered printable for filename-boundary scanning:
/// Python's `string.printable` minus its last five whitespace characters
/// (`\t\n\r\x0b\x0c`), leaving space and the graphic ASCII range.
fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

/// Scans a target process's memory for the decryption passwords of the
/// given archives.
///
/// Runs on a blocking worker thread (memory reads and PBKDF2 are
/// synchronous, CPU/syscall-bound work), so the async runtime stays free to
/// service other tasks. Exactly one [`Event::Finished`] is sent, always
/// last, whether the scan completed, was cancelled via `stop`, or failed.
pub async fn scan(config: Config, stop: Arc<AtomicBool>, events: mpsc::UnboundedSender<Event>) {
    let panic_events = events.clone();
    let joined = tokio::task::spawn_blocking(move || run(&config, &stop, &events)).await;

    if joined.is_err() {
        let _ = panic_events.send(Event::Error {
            kind: ErrorKind::Internal,
            detail: "scan worker task panicked".to_owned(),
        });
        let _ = panic_events.send(Event::Finished);
    }
}

fn run(config: &Config, stop: &AtomicBool, events: &mpsc::UnboundedSender<Event>) {
    match PlatformProcess::open(config.pid) {
        Ok(source) => run_with_source(&source, config, stop, events),
        Err(err) => {
            let err = Error::from(err);
            let _ = events.send(Event::Error {
                kind: err.kind,
                detail: err.to_string(),
            });
        }
    }
    let _ = events.send(Event::Finished);
}

fn run_with_source<M: MemorySource>(
    source: &M,
    config: &Config,
    stop: &AtomicBool,
    events: &mpsc::UnboundedSender<Event>,
) {
    for target in &config.archives {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let mut archive = match load_archive(&target.path) {
            Ok(archive) => archive,
            Err(err) => {
                let _ = events.send(Event::Warning(format!(
                    "{}: {err}",
                    target.basename
                )));
                continue;
            }
        };

        let occurrences = match source.search_bytes(target.basename.as_bytes()) {
            Ok(occurrences) => occurrences,
            Err(err) => {
                let err = Error::from(err);
                let _ = events.send(Event::Error {
                    kind: err.kind,
                    detail: err.to_string(),
                });
                return;
            }
        };

        if occurrences.is_empty() {
            for password in find_passwords_from_timestamp(source, &mut archive, stop) {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                let _ = events.send(Event::Progress {
                    filename: target.basename.clone(),
                    password,
                });
            }
            continue;
        }

        for address in occurrences {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            find_passwords(
                source,
                config,
                &mut archive,
                address,
                &target.basename,
                stop,
                events,
            );
        }
    }
}

fn load_archive(path: &Path) -> crate::multifile::Result<Archive> {
    let file = std::fs::File::open(path)?;
    Archive::load(std::io::BufReader::new(file))
}

/// Locates and verifies candidate passwords near one occurrence of an
/// archive's filename at address `address`, per SPEC_FULL §4.4.
#[allow(clippy::too_many_arguments)]
fn find_passwords<M: MemorySource>(
    source: &M,
    config: &Config,
    archive: &mut Archive,
    address: u64,
    name: &str,
    stop: &AtomicBool,
    events: &mpsc::UnboundedSender<Event>,
) {
    let radius = config.window_radius as u64;
    let Some(window_start) = address.checked_sub(radius) else {
        return;
    };
    let window_len = 2 * config.window_radius + name.len();

    let Ok(window) = source.read(window_start, window_len) else {
        return;
    };

    let name_start_in_window = config.window_radius;
    let name_end_in_window = name_start_in_window + name.len();

    let Some(start) = find_filename_start(&window, name_start_in_window) else {
        return;
    };
    let end = find_filename_end(&window, name_end_in_window);

    let target = &window[start..end];

    let string_object_addresses: Vec<u64> = if target.len() < 16 {
        vec![window_start + start as u64]
    } else {
        let value_addr = window_start + start as u64;
        match source.search_bytes(&value_addr.to_le_bytes()) {
            Ok(addresses) => addresses,
            Err(_) => return,
        }
    };

    if string_object_addresses.is_empty() {
        return;
    }

    let filename = String::from_utf8_lossy(target).into_owned();

    for delta in -config.struct_radius..config.struct_radius {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        for &object_address in &string_object_addresses {
            let Some(candidate_address) = object_address.checked_add_signed(delta) else {
                continue;
            };

            for candidate in read_string_all_layouts(source, candidate_address) {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                if archive.is_password(&candidate) {
                    let _ = events.send(Event::Progress {
                        filename: filename.clone(),
                        password: candidate,
                    });
                }
            }
        }
    }
}

/// Alternate discovery path for archives whose filename is not found
/// verbatim in memory (e.g. opened under a different path). Searches for
/// the archive header's raw 8-byte scale-factor/timestamp pair directly and
/// applies the fixed offsets `ScanWorker.py` used for this path.
fn find_passwords_from_timestamp<M: MemorySource>(
    source: &M,
    archive: &mut Archive,
    stop: &AtomicBool,
) -> Vec<Vec<u8>> {
    let mut needle = Vec::with_capacity(8);
    needle.extend_from_slice(&archive.scale_factor.to_le_bytes());
    needle.extend_from_slice(&archive.timestamp.to_le_bytes());

    let Ok(occurrences) = source.search_bytes(&needle) else {
        return Vec::new();
    };

    let mut passwords = Vec::new();
    for address in occurrences {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let Some(password_address) = address.checked_add_signed(TIMESTAMP_TO_PASSWORD_OFFSET)
        else {
            continue;
        };
        if !is_multifile(source, password_address) {
            continue;
        }
        for candidate in read_string_all_layouts(source, password_address) {
            if archive.is_password(&candidate) {
                passwords.push(candidate);
            }
        }
    }
    passwords
}

/// Corroborates that `address` sits near a multifile version-1.1 header, by
/// checking for the raw `u32(1), u32(1)` bytes at [`VERSION_CHECK_OFFSET`].
fn is_multifile<M: MemorySource>(source: &M, address: u64) -> bool {
    let Some(check_address) = address.checked_add_signed(VERSION_CHECK_OFFSET) else {
        return false;
    };
    match source.read(check_address, 8) {
        Ok(bytes) => bytes == [1, 0, 0, 0, 1, 0, 0, 0],
        Err(_) => false,
    }
}

/// Tries to reconstruct a string object at `address` under every known
/// layout (MSVC, then libc++), returning every candidate that was produced.
/// Both layouts are tried independently per SPEC_FULL §4.4; a corrupt
/// length word under one layout does not prevent the other from yielding
/// a candidate.
fn read_string_all_layouts<M: MemorySource>(source: &M, address: u64) -> Vec<Vec<u8>> {
    let Ok(bytes) = source.read(address, 24) else {
        return Vec::new();
    };
    let mut candidates = Vec::new();
    if let Some(candidate) = read_string_msvc(source, &bytes) {
        candidates.push(candidate);
    }
    if let Some(candidate) = read_string_libcxx(source, &bytes) {
        candidates.push(candidate);
    }
    candidates
}

/// MSVC `std::string` layout: 24-byte object, pointer at `[0..8]`, length
/// at `[16..24]`, inline capacity 16, no LSB tag.
fn read_string_msvc<M: MemorySource>(source: &M, object: &[u8]) -> Option<Vec<u8>> {
    let length = u64::from_le_bytes(object[16..24].try_into().expect("24-byte buffer"));
    let pointer = u64::from_le_bytes(object[0..8].try_into().expect("24-byte buffer"));

    if length < 16 {
        Some(object[..length as usize].to_vec())
    } else if length <= 1000 {
        source.read(pointer, length as usize).ok()
    } else {
        None
    }
}

/// libc++ `std::string` layout: 24-byte object, LSB-tagged; short form
/// stores length in the high 7 bits of byte 0 (inline capacity 23), long
/// form stores length at `[8..16]` and a pointer at `[16..24]`.
fn read_string_libcxx<M: MemorySource>(source: &M, object: &[u8]) -> Option<Vec<u8>> {
    if object[0] & 1 == 0 {
        let length = usize::from(object[0] & 0xFE);
        if length > 23 {
            return None;
        }
        Some(object[1..1 + length].to_vec())
    } else {
        let length = u64::from_le_bytes(object[8..16].try_into().expect("24-byte buffer"));
        let pointer = u64::from_le_bytes(object[16..24].try_into().expect("24-byte buffer"));
        if length <= 1000 {
            source.read(pointer, length as usize).ok()
        } else {
            None
        }
    }
}

/// Scans left from `name_start` while bytes are printable, returning one
/// past the first non-printable byte found, or `None` if the window's
/// start is reached first (an invalid, unbounded string).
fn find_filename_start(window: &[u8], name_start: usize) -> Option<usize> {
    let mut i = name_start;
    while i > 0 {
        i -= 1;
        if !is_printable(window[i]) {
            return Some(i + 1);
        }
    }
    None
}

/// Scans right from `name_end` while bytes are printable, returning the
/// offset of the first non-printable byte, or `name_end` itself if the
/// window is exhausted first.
fn find_filename_end(window: &[u8], name_end: usize) -> usize {
    for (offset, &byte) in window.iter().enumerate().skip(name_end) {
        if !is_printable(byte) {
            return offset;
        }
    }
    name_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher;
    use crate::config::ArchiveTarget;
    use crate::process::mock::MockProcess;
    use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};

    fn synthetic_archive_file(nid: u16, password: &[u8]) -> Vec<u8> {
        let iv_size = cipher::iv_size(nid).unwrap();
        let block_size = cipher::block_size(nid).unwrap();
        let key_length = 16_usize;
        let iv = vec![0_u8; iv_size];
        let iteration_count_raw = 1_u16;
        let iterations = cipher::iterations(iteration_count_raw);
        let key = cipher::derive_key(password, &iv, iterations, key_length);

        let mut plaintext = b"crypty".to_vec();
        plaintext.resize(block_size, 0);

        let ciphertext = {
            let mut c =
                cbc::Encryptor::<blowfish::Blowfish>::new_from_slices(&key, &iv).unwrap();
            let mut block = plaintext.clone();
            c.encrypt_padded_mut::<NoPadding>(&mut block, block_size)
                .unwrap()
                .to_vec()
        };

        let mut buf = Vec::new();
        buf.extend_from_slice(b"pmf\0\n\r");
        buf.extend_from_slice(&1_i16.to_le_bytes());
        buf.extend_from_slice(&1_i16.to_le_bytes());
        buf.extend_from_slice(&1_u32.to_le_bytes());
        buf.extend_from_slice(&0_u32.to_le_bytes());

        let subfile_offset = buf.len() as u32;
        let envelope_len = 6 + iv_size + block_size;
        let subfile_address = subfile_offset + 18;

        buf.extend_from_slice(&0_u32.to_le_bytes());
        buf.extend_from_slice(&subfile_address.to_le_bytes());
        buf.extend_from_slice(&(envelope_len as u32).to_le_bytes());
        buf.extend_from_slice(&0x0010_u16.to_le_bytes());
        buf.extend_from_slice(&(envelope_len as u32).to_le_bytes());

        buf.extend_from_slice(&nid.to_le_bytes());
        buf.extend_from_slice(&(key_length as u16).to_le_bytes());
        buf.extend_from_slice(&iteration_count_raw.to_le_bytes());
        buf.extend_from_slice(&iv);
        buf.extend_from_slice(&ciphertext);

        buf
    }

    /// Places a libc++-style long-form string object at `addr` pointing at
    /// `(pointer, len)`.
    fn write_libcxx_long(process: &mut MockProcess, addr: u64, pointer: u64, len: u64) {
        let mut object = [0_u8; 24];
        object[0] = 1; // long-form tag
        object[8..16].copy_from_slice(&len.to_le_bytes());
        object[16..24].copy_from_slice(&pointer.to_le_bytes());
        process.write(addr, &object);
    }

    /// Places an MSVC-style string object at `addr` holding a short,
    /// inline value.
    fn write_msvc_inline(process: &mut MockProcess, addr: u64, value: &[u8]) {
        let mut object = [0_u8; 24];
        object[..value.len()].copy_from_slice(value);
        object[16..24].copy_from_slice(&(value.len() as u64).to_le_bytes());
        process.write(addr, &object);
    }

    #[test]
    fn finds_printable_filename_boundaries() {
        let mut window = vec![0_u8; 40];
        window[10..19].copy_from_slice(b"assets.mf");
        // Left/right neighbors are non-printable (0x00), so boundaries sit
        // exactly at the filename.
        let start = find_filename_start(&window, 10).unwrap();
        let end = find_filename_end(&window, 19);
        assert_eq!(&window[start..end], b"assets.mf");
    }

    #[test]
    fn filename_with_no_boundary_is_rejected() {
        let window = vec![b'a'; 20];
        assert!(find_filename_start(&window, 10).is_none());
    }

    #[test]
    fn reconstructs_small_msvc_string() {
        let mut process = MockProcess::new(0x20000, vec![0_u8; 0x100]);
        write_msvc_inline(&mut process, 0x20000, b"secret");
        let candidates = read_string_all_layouts(&process, 0x20000);
        assert!(candidates.contains(&b"secret".to_vec()));
    }

    #[test]
    fn reconstructs_long_libcxx_string() {
        let mut process = MockProcess::new(0x10000, vec![0_u8; 0x100]);
        process.write(0x10100, b"correct horse battery staple");
        write_libcxx_long(&mut process, 0x20000, 0x10100, 29);
        let candidates = read_string_all_layouts(&process, 0x20000);
        assert!(candidates.contains(&b"correct horse battery staple".to_vec()));
    }

    #[test]
    fn end_to_end_scenario_e5_single_occurrence() {
        // "assets.mf" is shorter than 16 bytes, so the single candidate
        // string-object address is the filename occurrence itself (§4.4
        // step 4's short-string branch); the password sits Δ=40 away.
        let mut process = MockProcess::new(0x0F000, vec![0_u8; 0x2000]);
        process.write(0x10000, b"assets.mf");
        write_msvc_inline(&mut process, 0x10028, b"secret");

        let archive_bytes = synthetic_archive_file(cipher::NID_BF_CBC, b"secret");
        let mut archive =
            Archive::load(std::io::Cursor::new(archive_bytes.as_slice())).unwrap();

        let stop = AtomicBool::new(false);
        let config = Config {
            pid: 1,
            archives: vec![ArchiveTarget {
                path: "assets.mf".into(),
                basename: "assets.mf".into(),
            }],
            window_radius: 128,
            struct_radius: 1800,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        find_passwords(&process, &config, &mut archive, 0x10000, "assets.mf", &stop, &tx);
        drop(tx);

        let mut hits = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Progress { filename, password } = event {
                hits.push((filename, password));
            }
        }
        assert!(hits.contains(&("assets.mf".to_string(), b"secret".to_vec())));
    }

    #[test]
    fn end_to_end_scenario_e6_deduplicates_across_delta() {
        // A filename of 16 bytes or more takes the heap-pointer-search
        // branch instead: every pointer to the filename's own address is a
        // candidate string-object address. Two distinct objects pointing at
        // the same filename, each with its own nearby password string, let
        // the same triple surface twice, which is legitimate: dedup is
        // documented as the collector's job, not the scanner's.
        let name = "correct_horse_battery.mf";
        assert!(name.len() >= 16);

        let mut process = MockProcess::new(0x0F000, vec![0_u8; 0x2000]);
        process.write(0x10000, name.as_bytes());
        // Pointer bytes land at addr+16, which is what `search_bytes` on the
        // filename's own address will report as the object address.
        write_libcxx_long(&mut process, 0x20000, 0x10000, name.len() as u64);
        write_libcxx_long(&mut process, 0x20010, 0x10000, name.len() as u64);
        write_msvc_inline(&mut process, 0x20010 + 40, b"secret");
        write_msvc_inline(&mut process, 0x20020 + 40, b"secret");

        let archive_bytes = synthetic_archive_file(cipher::NID_BF_CBC, b"secret");
        let mut archive =
            Archive::load(std::io::Cursor::new(archive_bytes.as_slice())).unwrap();

        let stop = AtomicBool::new(false);
        let config = Config {
            pid: 1,
            archives: vec![],
            window_radius: 128,
            struct_radius: 1800,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        find_passwords(&process, &config, &mut archive, 0x10000, name, &stop, &tx);
        drop(tx);

        let mut hits = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Progress { filename, password } = event {
                hits.push((filename, password));
            }
        }
        let occurrences = hits
            .iter()
            .filter(|(filename, password)| filename.as_str() == name && password.as_slice() == b"secret")
            .count();
        assert_eq!(occurrences, 2);
    }
}
