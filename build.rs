//! Build script for mfpass.
//!
//! Sets Git-related environment variables if available:
//! * `MFPASS_COMMIT_HASH` - Abbreviated commit hash
//! * `MFPASS_COMMIT_DATE` - Commit date
//!
//! The Git information can be accessed at runtime using:
//! * `env!("MFPASS_COMMIT_HASH")` for the commit hash
//! * `env!("MFPASS_COMMIT_DATE")` for the commit date

use git2::Repository;
use time::OffsetDateTime;

fn main() {
    if let Ok(repo) = Repository::open(".") {
        if let Some(commit) = repo.head().ok().and_then(|head| head.peel_to_commit().ok()) {
            if let Some(hash) = commit
                .as_object()
                .short_id()
                .ok()
                .and_then(|buf| buf.as_str().map(|s| s.to_string()))
            {
                println!("cargo:rustc-env=MFPASS_COMMIT_HASH={hash}");
            }

            if let Ok(timestamp) = OffsetDateTime::from_unix_timestamp(commit.time().seconds()) {
                let format = time::format_description::parse("[year]-[month]-[day]")
                    .expect("invalid date format string");
                println!(
                    "cargo:rustc-env=MFPASS_COMMIT_DATE={}",
                    timestamp.format(&format).expect("could not format date")
                );
            }
        }
    }
}
