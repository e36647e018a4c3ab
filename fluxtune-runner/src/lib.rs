#![warn(missing_docs)]
//! fluxtune Runner - Job Execution
//!
//! Runs compile and benchmark jobs as external processes:
//! - [`DeviceSlotPool`] lends exclusive device handles, one per in-flight job
//! - [`JobRunner`] spawns one process per job, captures its output and kills it on timeout
//! - [`ParallelExecutor`] fans candidates out over the pool and records each result
//!   into the candidate store as soon as its job finishes

mod command;
mod device;
mod executor;
mod job;
mod output;

pub use command::{ArtifactLayout, CommandSpec, RenderContext, ToolCommand};
pub use device::{
    AssumeReachable, Device, DeviceError, DeviceSlot, DeviceSlotPool, DeviceValidator,
    ProbeCommand,
};
pub use executor::{ExecutorError, ExecutorSettings, ParallelExecutor};
pub use job::{JobOutput, JobRunner};
pub use output::{LatencySummary, parse_benchmark_output};

/// Environment variable carrying the device id into every spawned job
pub const DEVICE_ENV: &str = "FLUXTUNE_DEVICE";

/// Environment variable carrying the candidate id into every spawned job
pub const CANDIDATE_ENV: &str = "FLUXTUNE_CANDIDATE";
