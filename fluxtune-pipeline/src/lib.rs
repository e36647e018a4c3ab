#![warn(missing_docs)]
//! fluxtune Pipeline - Phased Tuning Runs
//!
//! Wires the pieces of a tuning run together:
//! - [`TuneConfig`] loads `fluxtune.toml`
//! - [`Pipeline`] validates devices, prepares the working directories and
//!   writes `summary.json`
//! - [`PhaseController`] walks the phases up to the stop-after phase, with
//!   top-K selection after every benchmark phase

mod config;
mod controller;
mod error;
mod logging;
mod paths;
mod pipeline;
mod selection;

pub use config::{CONFIG_FILE, DevicesConfig, PathsConfig, RunnerConfig, ToolsConfig, TuneConfig};
pub use controller::{PhaseController, PhasePlan};
pub use error::PipelineError;
pub use logging::init_logging;
pub use paths::PathConfig;
pub use pipeline::{Pipeline, PipelineConfig};
pub use selection::select_top_k;
