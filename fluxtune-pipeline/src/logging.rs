//! Logging setup

use crate::error::PipelineError;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

fn default_filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "fluxtune=debug"
    } else {
        "fluxtune=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn open_run_log(path: &Path) -> Result<File, PipelineError> {
    let io_error = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error)
}

fn subscriber(filter: EnvFilter, run_log: Option<File>) -> impl Subscriber + Send + Sync + 'static {
    let file_layer = run_log.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
}

/// Install a `tracing` subscriber writing to stderr and, when given, appending
/// to `run_log` as well. `RUST_LOG` overrides the default level
/// (`fluxtune=info`, or `fluxtune=debug` when `verbose`). A subscriber that
/// is already installed is left in place.
pub fn init_logging(verbose: bool, run_log: Option<&Path>) -> Result<(), PipelineError> {
    let run_log = run_log.map(open_run_log).transpose()?;
    let _ = subscriber(default_filter(verbose), run_log).try_init();
    Ok(())
}
