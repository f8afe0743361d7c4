//! Process enumeration.
//!
//! A thin wrapper around `sysinfo`, producing the opaque `(pid, name)` pairs
//! the CLI needs to resolve `--process-name` to a pid or to implement
//! `--list`. Deliberately minimal: process enumeration itself is an
//! external collaborator, not part of the three hard subsystems this crate
//! implements.

use sysinfo::System;

/// One running process, as reported by the OS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    /// The process id.
    pub pid: u32,
    /// The process's executable name, as reported by the OS.
    pub name: String,
}

/// Lists every process currently visible to this user.
#[must_use]
pub fn list() -> Vec<ProcessInfo> {
    let mut system = System::new();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    system
        .processes()
        .iter()
        .map(|(pid, process)| ProcessInfo {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().into_owned(),
        })
        .collect()
}
