//! Configuration for mfpass.
//!
//! This module handles:
//! * Target process selection (PID or resolved process name)
//! * The archives to scan (paths plus their basenames as they would appear
//!   in the target's memory)
//! * Tunable scan parameters ([`Config::window_radius`], [`Config::struct_radius`])
//!
//! # Examples
//!
//! ```rust
//! use mfpass::config::Config;
//! use std::path::PathBuf;
//!
//! let config = Config::new(1234, vec![PathBuf::from("assets.mf")]);
//! assert_eq!(config.pid, 1234);
//! assert_eq!(config.window_radius, mfpass::config::DEFAULT_WINDOW_RADIUS);
//! ```

use std::path::PathBuf;

/// Default number of bytes read on each side of a filename occurrence
/// before searching for the printable-string boundary (§4.4 step 1).
pub const DEFAULT_WINDOW_RADIUS: usize = 128;

/// Default byte radius, centered on a filename-bearing string object,
/// within which nearby strings are reconstructed and offered as candidate
/// passwords (§9, "Open questions").
pub const DEFAULT_STRUCT_RADIUS: i64 = 1800;

/// One archive to scan: its path on disk (read once, up front, via
/// [`crate::multifile::Archive::load`]) and the basename under which it is
/// expected to appear in the target process's memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveTarget {
    /// Path to the multifile on disk.
    pub path: PathBuf,
    /// The filename, as it is expected to appear verbatim in the target's
    /// memory (typically the path's final component).
    pub basename: String,
}

impl ArchiveTarget {
    /// Builds a target from a path, deriving `basename` from its final
    /// component.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::invalid_argument`] if `path` has no
    /// file name component or it is not valid UTF-8.
    pub fn from_path(path: PathBuf) -> crate::error::Result<Self> {
        let basename = path
            .file_name()
            .and_then(std::ffi::OsStr::to_str)
            .ok_or_else(|| {
                crate::error::Error::invalid_argument(format!(
                    "archive path has no valid UTF-8 file name: {}",
                    path.display()
                ))
            })?
            .to_owned();
        Ok(Self { path, basename })
    }
}

/// Complete configuration for a single scan invocation.
///
/// Constructed once from parsed CLI arguments and resolved process
/// selection; immutable for the lifetime of the scan.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Target process id.
    pub pid: u32,

    /// Archives to scan for, in the order they were given on the command
    /// line. The scanner processes them in this order and emits events for
    /// one before moving to the next.
    pub archives: Vec<ArchiveTarget>,

    /// Bytes read on each side of a filename occurrence before searching
    /// for the printable-string boundary.
    ///
    /// By default [`DEFAULT_WINDOW_RADIUS`].
    pub window_radius: usize,

    /// Byte radius around a filename-bearing string object within which
    /// nearby strings are reconstructed and tried as candidate passwords.
    ///
    /// By default [`DEFAULT_STRUCT_RADIUS`]. May be widened but should not
    /// be narrowed without empirical justification (§9).
    pub struct_radius: i64,
}

impl Config {
    /// Creates a configuration for `pid` scanning `archives`, with default
    /// scan-window parameters.
    #[must_use]
    pub fn new(pid: u32, archives: Vec<PathBuf>) -> Self {
        let archives = archives
            .into_iter()
            .filter_map(|path| ArchiveTarget::from_path(path).ok())
            .collect();
        Self {
            pid,
            archives,
            window_radius: DEFAULT_WINDOW_RADIUS,
            struct_radius: DEFAULT_STRUCT_RADIUS,
        }
    }
}

/// Resolves a `--process-name` argument to exactly one running process id.
///
/// # Errors
///
/// Returns [`crate::error::Error::not_found`] if no running process matches
/// `name`, or [`crate::error::Error::failed_precondition`] if more than one
/// does (the caller should disambiguate with `--pid` instead).
pub fn resolve_pid(name: &str) -> crate::error::Result<u32> {
    let matches: Vec<_> = crate::processes::list()
        .into_iter()
        .filter(|p| p.name.eq_ignore_ascii_case(name))
        .collect();

    match matches.as_slice() {
        [] => Err(crate::error::Error::not_found(format!(
            "no running process named {name:?}"
        ))),
        [one] => Ok(one.pid),
        many => Err(crate::error::Error::failed_precondition(format!(
            "process name {name:?} is ambiguous: matches pids {:?}",
            many.iter().map(|p| p.pid).collect::<Vec<_>>()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_basename_from_path() {
        let target = ArchiveTarget::from_path(PathBuf::from("/opt/game/assets/main.mf")).unwrap();
        assert_eq!(target.basename, "main.mf");
    }

    #[test]
    fn rejects_path_with_no_file_name() {
        assert!(ArchiveTarget::from_path(PathBuf::from("/")).is_err());
    }

    #[test]
    fn config_defaults_window_and_struct_radius() {
        let config = Config::new(42, vec![PathBuf::from("a.mf")]);
        assert_eq!(config.window_radius, DEFAULT_WINDOW_RADIUS);
        assert_eq!(config.struct_radius, DEFAULT_STRUCT_RADIUS);
    }
}
