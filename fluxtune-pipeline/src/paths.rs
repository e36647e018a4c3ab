//! Working directory layout of a run
//!
//! ```text
//! <base>/
//!   specs/         candidate specs written by the generator
//!   compiled/      <kind>_<id>.<ext>, one artifact per candidate
//!   run.log        log of the run, written by `init_logging`
//!   summary.json   report of the finished run
//! ```

use crate::config::PathsConfig;
use crate::error::PipelineError;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved paths of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConfig {
    /// Base working directory
    pub base_dir: PathBuf,
    /// Directory the candidate generator writes specs into
    pub specs_dir: PathBuf,
    /// Directory compiled artifacts go to
    pub compiled_dir: PathBuf,
    /// Execution log of the run
    pub run_log: PathBuf,
    /// JSON report written after the run
    pub summary: PathBuf,
}

impl PathConfig {
    /// Layout rooted at `base_dir` with the default specs directory name
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_specs_dir(base_dir, "specs")
    }

    /// Layout rooted at `base_dir` with a custom specs directory name
    pub fn with_specs_dir(base_dir: impl Into<PathBuf>, specs_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.into();
        Self {
            specs_dir: base_dir.join(specs_dir),
            compiled_dir: base_dir.join("compiled"),
            run_log: base_dir.join("run.log"),
            summary: base_dir.join("summary.json"),
            base_dir,
        }
    }

    /// Layout from configuration; the base directory defaults to a
    /// timestamped name in the current directory
    pub fn from_config(config: &PathsConfig) -> Self {
        let base_dir = config
            .base_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_base_dir);
        Self::with_specs_dir(base_dir, &config.specs_dir)
    }

    /// `tuning_<YYYY_MM_DD_HH_MM>` for the current local time
    pub fn default_base_dir() -> PathBuf {
        PathBuf::from(Local::now().format("tuning_%Y_%m_%d_%H_%M").to_string())
    }

    /// Create every directory of the layout
    pub fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for dir in [&self.base_dir, &self.specs_dir, &self.compiled_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(base_dir = %self.base_dir.display(), "working directories ready");
        Ok(())
    }
}
