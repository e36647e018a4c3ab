//! Pipeline errors. Everything here aborts the run; per-candidate job
//! failures are recorded in the store instead.

use fluxtune_core::{Phase, StoreError, UnknownPhase};
use fluxtune_runner::{DeviceError, ExecutorError};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of a tuning run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Device list empty, duplicated or failing validation
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// `stop_after` named no known phase
    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),

    /// Invalid configuration value
    #[error("Invalid configuration: {0:#}")]
    Config(anyhow::Error),

    /// The candidate generator failed
    #[error("Candidate generation failed: {0:#}")]
    Generator(anyhow::Error),

    /// The generator returned a spec that does not exist
    #[error("Generated spec not found: {}", .0.display())]
    MissingSpec(PathBuf),

    /// Model phases are enabled but no model input is configured
    #[error("No model inputs configured but the run goes up to {0}")]
    NoModelInputs(Phase),

    /// A configured model input does not exist
    #[error("Model input not found: {}", .0.display())]
    MissingModelInput(PathBuf),

    /// A working directory or report could not be written
    #[error("Cannot write {}: {source}", path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The summary could not be serialized
    #[error("Cannot serialize summary: {0}")]
    Report(#[from] serde_json::Error),

    /// Recording into the store was rejected
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A phase could not be executed
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The pipeline was asked to stop
    #[error("Run aborted before {0}")]
    Aborted(Phase),

    /// `run` was called on a pipeline whose store already holds candidates
    #[error("Pipeline has already run; create a new one")]
    AlreadyRun,
}
