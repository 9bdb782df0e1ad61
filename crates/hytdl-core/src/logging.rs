//! Logging init: file under the XDG state dir, or fallback to stderr.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging to `~/.local/state/hytdl/hytdl.log`,
/// falling back to stderr when the state dir is unavailable. Progress output
/// goes to stdout and stays out of the log stream either way.
pub fn init() {
    let writer = match open_log_file() {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(_) => BoxMakeWriter::new(std::io::stderr),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hytdl_core=debug,hytdl_cli=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
}

fn open_log_file() -> anyhow::Result<File> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hytdl")?;
    let path = xdg_dirs.place_state_file("hytdl.log")?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}
