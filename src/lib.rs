//! Recovers Panda3D multifile (`.mf`/`.ef`) decryption passwords from a
//! running process's memory.
//!
//! **mfpass** attaches to a live process, locates the archive's filename as
//! it appears verbatim in that process's heap, reconstructs nearby C++
//! standard-library string objects under the layouts used by the major
//! standard library implementations, and verifies each candidate by
//! attempting a real PBKDF2 + Blowfish/AES decryption against the archive's
//! own magic-header oracle.
//!
//! # Architecture
//!
//! * **Archive format**: [`multifile`] parses the `.mf`/`.ef` envelope
//!   (header, subfile directory, encrypted-subfile key-derivation
//!   parameters) and verifies candidate passwords against it.
//! * **Cryptography**: [`cipher`] derives keys via PBKDF2-HMAC-SHA1 and
//!   decrypts a single verification block under Blowfish-CBC or
//!   AES-256-CBC.
//! * **Process memory**: [`process`] abstracts reading and searching a
//!   target process's address space, with platform backends for Linux and
//!   Windows.
//! * **Scanning**: [`scanner`] drives the recovery end to end: finding the
//!   filename, reconstructing nearby strings, and verifying candidates.
//! * **Process discovery**: [`processes`] resolves `--process-name` to a
//!   process id.
//! * **Byte-oriented parsing**: [`reader`] is the small cursor used to
//!   decode the multifile's binary layout.
//! * **Configuration**: [`config`] holds a scan's target process, archive
//!   list, and tunable scan-window parameters.
//! * **Events and errors**: [`events`] is the scanner's streaming output;
//!   [`error`] is the crate-wide error taxonomy.
//! * **Shutdown**: [`signal`] turns OS signals into a cooperative stop
//!   request.
//!
//! # Example
//!
//! ```rust,no_run
//! use mfpass::config::Config;
//! use std::path::PathBuf;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let config = Config::new(1234, vec![PathBuf::from("assets.mf")]);
//!     let stop = Arc::new(AtomicBool::new(false));
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     tokio::spawn(mfpass::scanner::scan(config, stop, tx));
//!     while let Some(event) = rx.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! Errors are handled through the types in the [`error`] module, with most
//! fallible functions returning [`Result`](error::Result).
//!
//! # Concurrency
//!
//! Scanning is CPU- and syscall-bound; [`scanner::scan`] runs it on a
//! blocking task so the async runtime stays free, and streams progress back
//! over an unbounded channel.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![doc(test(attr(ignore)))]

#[macro_use]
extern crate log;

pub mod cipher;
pub mod config;
pub mod error;
pub mod events;
pub mod multifile;
pub mod process;
pub mod processes;
pub mod reader;
pub mod scanner;
pub mod signal;
