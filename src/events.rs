//! Events emitted while scanning a process's memory for multifile passwords.
//!
//! These events are the scanner's only channel to its consumer (the CLI
//! binary in this crate, or any external presentation layer): progress
//! toward recovered passwords, non-fatal warnings, a fatal error, and
//! exactly one terminal `Finished`.
//!
//! # Example
//!
//! ```rust
//! use mfpass::events::Event;
//!
//! fn handle_event(event: Event) {
//!     match event {
//!         Event::Progress { filename, .. } => println!("recovered a password for {filename}"),
//!         Event::Warning(message) => eprintln!("warning: {message}"),
//!         Event::Error { detail, .. } => eprintln!("error: {detail}"),
//!         Event::Finished => println!("scan complete"),
//!     }
//! }
//! ```

use crate::error::ErrorKind;

/// Events emitted by [`crate::scanner::scan`].
///
/// # Ordering
///
/// [`Event::Finished`] is always the last event emitted for a scan, whether
/// it completed normally, was cancelled, or failed. A `Progress` event for
/// one archive is never followed by another archive's events out of order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A candidate password was verified against an archive's magic header
    /// and passed.
    Progress {
        /// The multifile's reconstructed filename, as found in memory.
        filename: String,
        /// The recovered password.
        password: Vec<u8>,
    },

    /// A non-fatal condition occurred; the scan continues.
    ///
    /// Used for malformed or unsupported archives (skip and move to the
    /// next one) and similar recoverable conditions.
    Warning(String),

    /// A fatal condition ended the scan before all archives were processed.
    Error {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Human-readable detail.
        detail: String,
    },

    /// The scan has ended. Always the last event for a given scan.
    Finished,
}
