//! Command-line entry point.
//!
//! This module handles:
//! * Command line argument parsing
//! * Logging configuration
//! * Resolving `--pid`/`--process-name` to a target process
//! * Driving a scan to completion and reporting results
//!
//! # Runtime Behavior
//!
//! The application:
//! 1. Parses arguments and resolves the target process.
//! 2. Loads the requested archives and starts the scanner on a background
//!    task.
//! 3. Prints recovered passwords as they are found, deduplicated by
//!    `(filename, password)`.
//! 4. Shuts down cooperatively on Ctrl-C/SIGTERM, waiting for the scanner's
//!    final `Finished` event before exiting.
//!
//! # Error Handling
//!
//! Malformed or unsupported archives are logged as warnings and skipped;
//! process-level failures are fatal and reported before a non-zero exit.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, warn, LevelFilter};

use mfpass::{
    config::Config,
    events::Event,
    processes,
    scanner,
    signal::{self, ShutdownSignal},
};

/// Build profile indicator for logging.
///
/// Shows "debug" when built without optimizations.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";

/// Build profile indicator for logging.
///
/// Shows "release" when built with optimizations.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
///
/// Used by clap to ensure -q (quiet) and -v (verbose) flags cannot be used
/// together.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, PartialEq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Process id of the target process
    #[arg(long, value_name = "PID", env = "MFPASS_PID")]
    pid: Option<u32>,

    /// Name of the target process, resolved via the OS process list
    ///
    /// Errors if no running process matches, or if more than one does (use
    /// `--pid` to disambiguate).
    #[arg(long, value_name = "NAME", conflicts_with = "pid", env = "MFPASS_PROCESS_NAME")]
    process_name: Option<String>,

    /// List running processes as `(pid, name)` pairs and exit
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Multifile archives to scan (`.mf`/`.ef`)
    #[arg(value_name = "ARCHIVE", value_hint = ValueHint::FilePath)]
    archives: Vec<PathBuf>,

    /// Bytes read on each side of a filename occurrence before searching
    /// for the printable-string boundary
    #[arg(long, value_name = "BYTES", env = "MFPASS_WINDOW_RADIUS")]
    window_radius: Option<usize>,

    /// Byte radius around a filename-bearing string object within which
    /// nearby strings are tried as candidate passwords
    #[arg(long, value_name = "BYTES", env = "MFPASS_STRUCT_RADIUS")]
    struct_radius: Option<i64>,

    /// Suppress all output except warnings and errors
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING, env = "MFPASS_QUIET")]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Use -v for debug logging, -vv for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING, env = "MFPASS_VERBOSE")]
    verbose: u8,
}

/// Initializes logging.
///
/// Configures logging based on command line arguments and environment:
/// * `-q` sets Warning level
/// * `-v` sets Debug level
/// * `-vv` sets Trace level
/// * `RUST_LOG` provides defaults
/// * External crates are limited to Warning level
///
/// # Panics
///
/// Panics if the logger is already initialized.
fn init_logger(args: &Args) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let mut external_level = LevelFilter::Error;
    if args.quiet || args.verbose > 0 {
        let level = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::max(),
        };

        logger.filter_module(module_path!(), level);
        logger.filter_module("mfpass", level);

        if level == LevelFilter::Trace {
            external_level = LevelFilter::max();
        }
    }

    for external_module in ["sysinfo"] {
        logger.filter_module(external_module, external_level);
    }

    logger.init();
}

/// Resolves the target process id from `--pid` or `--process-name`.
///
/// # Errors
///
/// Returns an error if neither is given, or if `--process-name` cannot be
/// resolved to exactly one process.
fn resolve_target(args: &Args) -> mfpass::error::Result<u32> {
    if let Some(pid) = args.pid {
        return Ok(pid);
    }
    if let Some(name) = &args.process_name {
        return mfpass::config::resolve_pid(name);
    }
    Err(mfpass::error::Error::invalid_argument(
        "either --pid or --process-name is required",
    ))
}

/// Runs a scan to completion, printing recovered passwords as they arrive.
///
/// Returns the number of distinct `(filename, password)` triples recovered
/// and whether a fatal error was observed.
async fn run(config: Config, stop: Arc<AtomicBool>) -> (usize, bool) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let scan_task = tokio::spawn(scanner::scan(config, Arc::clone(&stop), tx));

    let mut seen = HashSet::new();
    let mut fatal = false;

    let mut signals = match signal::Handler::new() {
        Ok(signals) => Some(signals),
        Err(err) => {
            warn!("could not install signal handlers: {err}");
            None
        }
    };

    loop {
        let event = if let Some(signals) = signals.as_mut() {
            tokio::select! {
                biased;
                signal = signals.recv() => {
                    match signal {
                        ShutdownSignal::Interrupt | ShutdownSignal::Terminate => {
                            info!("received {signal}, stopping scan");
                            stop.store(true, Ordering::Relaxed);
                        }
                        ShutdownSignal::Reload => {
                            warn!("received {signal}; ignored, a scan cannot be reloaded");
                        }
                    }
                    continue;
                }
                event = rx.recv() => event,
            }
        } else {
            rx.recv().await
        };

        let Some(event) = event else {
            break;
        };

        match event {
            Event::Progress { filename, password } => {
                if seen.insert((filename.clone(), password.clone())) {
                    println!("{filename}: {}", String::from_utf8_lossy(&password));
                }
            }
            Event::Warning(message) => warn!("{message}"),
            Event::Error { kind, detail } => {
                error!("{kind:?}: {detail}");
                fatal = true;
            }
            Event::Finished => break,
        }
    }

    let _ = scan_task.await;
    (seen.len(), fatal)
}

/// Application entry point.
///
/// Exits with status code:
/// - 0 on a clean scan (even with zero passwords recovered)
/// - 1 if a fatal error occurred or arguments were invalid
#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(&args);
    debug!("Command {args:#?}");

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let mut version = cmd.get_version().unwrap_or("UNKNOWN").to_string();
    if let Some(hash) = option_env!("MFPASS_COMMIT_HASH") {
        version.push_str(&format!(".{hash}"));
    }
    if let Some(date) = option_env!("MFPASS_COMMIT_DATE") {
        version.push_str(&format!(" ({date})"));
    }
    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if args.list {
        for process in processes::list() {
            println!("{}\t{}", process.pid, process.name);
        }
        std::process::exit(0);
    }

    let pid = match resolve_target(&args) {
        Ok(pid) => pid,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    if args.archives.is_empty() {
        error!("no archives given; pass one or more archive paths");
        std::process::exit(1);
    }

    let mut config = Config::new(pid, args.archives);
    if let Some(window_radius) = args.window_radius {
        config.window_radius = window_radius;
    }
    if let Some(struct_radius) = args.struct_radius {
        config.struct_radius = struct_radius;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let (recovered, fatal) = run(config, stop).await;

    info!("recovered {recovered} password(s)");
    if fatal {
        std::process::exit(1);
    }
    std::process::exit(0);
}
