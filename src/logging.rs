//! Process-wide JSON log sink.

use crate::error::HenchmanError;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, Level};

/// Install the JSON subscriber writing to `path`. Debug events are only
/// recorded when `debug` is set.
pub fn init(path: &Path, debug: bool) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let level = if debug { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))
}

/// Log `err` with its fields, print it to stderr and exit with status 1.
pub fn fatal(err: &HenchmanError) -> ! {
    error!(kind = %err.kind(), fields = %err.fields_json(), "{}", err);
    eprintln!("FATAL: {err}");
    std::process::exit(1)
}
