//! Logging setup
//!
//! Stdout belongs to the control channel, so log lines go to a rotating
//! `proxy.log` (truncated at startup) mirrored to stderr.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Log file written next to the process working directory.
pub const LOG_FILE: &str = "proxy.log";

/// Install the global subscriber. Respects `RUST_LOG`, defaulting to debug
/// for the proxy's own crates.
pub fn init() -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(LOG_FILE)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,realmbridge_core=debug,realmbridge_proto=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file).and(std::io::stderr))
        .with_ansi(false)
        .init();
    Ok(())
}
