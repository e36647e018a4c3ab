#![warn(missing_docs)]
//! # fluxtune
//!
//! Autotuning pipeline for compiler artifacts.
//!
//! A run searches a space of compilation configurations by compiling and
//! benchmarking candidates on real devices, narrowing the field phase by phase:
//! - **generate_candidates**: a [`CandidateGenerator`] writes one spec per candidate
//! - **compile_dispatches / benchmark_dispatches**: every sub-unit candidate is
//!   compiled and timed; the fastest K survive
//! - **compile_models / benchmark_models**: survivors are applied to the full
//!   program, compiled and timed again
//!
//! Jobs run as external processes, one per device at a time. A failing or hanging
//! candidate is recorded and dropped without affecting the others.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fluxtune::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let strategy = StaticStrategy::default();
//!     let generator = |specs: &std::path::Path| -> anyhow::Result<Vec<std::path::PathBuf>> {
//!         write_candidate_specs(specs)
//!     };
//!     let report = fluxtune::run(strategy, generator)?;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub use fluxtune_core::{
    BenchmarkResult, Candidate, CandidateGenerator, CandidateId, CandidateKind, CandidateStore,
    CandidateTracker, CompileResult, JobKind, JobOutcome, JobStatus, NewCandidate, Phase,
    RunOutcome, StaticStrategy, StoreError, TuningStrategy, UnknownPhase,
};

pub use fluxtune_runner::{
    ArtifactLayout, AssumeReachable, CommandSpec, Device, DeviceError, DeviceSlot,
    DeviceSlotPool, DeviceValidator, ExecutorError, ExecutorSettings, JobOutput, JobRunner,
    LatencySummary, ParallelExecutor, ProbeCommand, ToolCommand, parse_benchmark_output,
};

pub use fluxtune_report::{
    KindSummary, ReportMeta, SurvivorEntry, TuningReport, build_report, format_human_output,
    generate_json_report,
};

pub use fluxtune_pipeline::{
    CONFIG_FILE, PathConfig, PhaseController, PhasePlan, Pipeline, PipelineConfig, PipelineError,
    TuneConfig, init_logging, select_top_k,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CandidateGenerator, Phase, Pipeline, PipelineConfig, RunOutcome, StaticStrategy,
        TuneConfig, TuningStrategy,
    };
}

/// Run a tuning session configured by the nearest `fluxtune.toml` (defaults
/// when none is found) and print the summary to stdout.
///
/// Log events go to stderr and to `run.log` in the run's base directory.
/// Set `FLUXTUNE_VERBOSE=1` for debug logging.
pub fn run(
    strategy: impl TuningStrategy + 'static,
    generator: impl CandidateGenerator + 'static,
) -> anyhow::Result<TuningReport> {
    let verbose = std::env::var_os("FLUXTUNE_VERBOSE").is_some_and(|v| v != "0");

    let config = TuneConfig::discover()?.unwrap_or_default();
    let config = PipelineConfig::from_config(&config)?;
    init_logging(verbose, Some(&config.paths.run_log))?;
    tracing::debug!(?config, "resolved configuration");

    let report = Pipeline::new(config, strategy, generator).run()?;
    print!("{}", format_human_output(&report));
    Ok(report)
}
