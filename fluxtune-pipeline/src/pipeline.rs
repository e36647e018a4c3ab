//! Pipeline entry point
//!
//! ```text
//! Pipeline::run
//!   ├─ DeviceSlotPool::new      validate every device (fatal on failure,
//!   │                           skipped on a dry run)
//!   ├─ check model inputs       only when model phases will run
//!   ├─ PathConfig::ensure_dirs
//!   ├─ PhaseController::run     phases up to stop_after
//!   └─ summary.json
//! ```

use crate::config::TuneConfig;
use crate::controller::{PhaseController, PhasePlan};
use crate::error::PipelineError;
use crate::paths::PathConfig;
use fluxtune_core::{CandidateGenerator, CandidateStore, Phase, TuningStrategy};
use fluxtune_report::{ReportMeta, TuningReport, build_report, generate_json_report};
use fluxtune_runner::{
    ArtifactLayout, AssumeReachable, DeviceSlotPool, DeviceValidator, ExecutorSettings, JobRunner,
    ParallelExecutor, ProbeCommand, ToolCommand,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::info;

/// Fully resolved settings of one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Device identifiers, validated before anything runs
    pub devices: Vec<String>,
    /// Cap on concurrent jobs
    pub jobs: Option<usize>,
    /// Last phase to run
    pub stop_after: Phase,
    /// Dispatch candidates kept after benchmarking
    pub num_dispatch_candidates: Option<usize>,
    /// Model candidates kept after benchmarking
    pub num_model_candidates: Option<usize>,
    /// Upper bound on a single compile job
    pub compile_timeout: Duration,
    /// Working directory layout
    pub paths: PathConfig,
    /// Full-program inputs for the model phases
    pub model_inputs: Vec<PathBuf>,
    /// Compiler invocation
    pub compile: ToolCommand,
    /// Benchmark tool invocation
    pub benchmark: ToolCommand,
    /// Extension of compiled artifacts
    pub artifact_extension: String,
    /// Per-device health check
    pub probe: Option<ProbeCommand>,
    /// Draw a progress bar per phase
    pub show_progress: bool,
    /// Skip device validation; devices are taken as listed
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Resolve a loaded configuration. Fails on an unknown `stop_after` or an
    /// unparsable duration.
    pub fn from_config(config: &TuneConfig) -> Result<Self, PipelineError> {
        let stop_after: Phase = config.runner.stop_after.parse()?;
        let compile_timeout = TuneConfig::parse_duration(&config.runner.compile_timeout)
            .map_err(PipelineError::Config)?;

        let probe = match &config.devices.probe {
            Some(program) => {
                let timeout = TuneConfig::parse_duration(&config.devices.probe_timeout)
                    .map_err(PipelineError::Config)?;
                Some(ProbeCommand::new(
                    program.as_str(),
                    &config.devices.probe_args,
                    timeout,
                ))
            }
            None => None,
        };

        Ok(Self {
            devices: config.runner.devices.clone(),
            jobs: config.runner.jobs,
            stop_after,
            num_dispatch_candidates: config.runner.num_dispatch_candidates,
            num_model_candidates: config.runner.num_model_candidates,
            compile_timeout,
            paths: PathConfig::from_config(&config.paths),
            model_inputs: config.paths.model_inputs.iter().map(PathBuf::from).collect(),
            compile: ToolCommand::new(config.tools.compiler.as_str(), &config.tools.compile_args),
            benchmark: ToolCommand::new(
                config.tools.benchmark.as_str(),
                &config.tools.benchmark_args,
            ),
            artifact_extension: config.tools.artifact_extension.clone(),
            probe,
            show_progress: config.runner.progress,
            dry_run: config.runner.dry_run,
        })
    }

    fn runs_model_phases(&self) -> bool {
        self.stop_after >= Phase::CompileModels
    }
}

/// A tuning run: configuration plus the caller's strategy and generator
pub struct Pipeline {
    config: PipelineConfig,
    strategy: Box<dyn TuningStrategy>,
    generator: Box<dyn CandidateGenerator>,
    validator: Box<dyn DeviceValidator>,
    store: Arc<CandidateStore>,
    abort: Arc<AtomicBool>,
}

impl Pipeline {
    /// Pipeline validating devices with the configured probe, if any
    pub fn new(
        config: PipelineConfig,
        strategy: impl TuningStrategy + 'static,
        generator: impl CandidateGenerator + 'static,
    ) -> Self {
        let validator: Box<dyn DeviceValidator> = match &config.probe {
            Some(probe) => Box::new(probe.clone()),
            None => Box::new(AssumeReachable),
        };
        Self {
            config,
            strategy: Box::new(strategy),
            generator: Box::new(generator),
            validator,
            store: Arc::new(CandidateStore::new()),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the device validation policy
    pub fn with_validator(mut self, validator: impl DeviceValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Candidate history, complete once `run` returns
    pub fn store(&self) -> &Arc<CandidateStore> {
        &self.store
    }

    /// Resolved configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Flag that stops the run before its next phase when set
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Run the pipeline and write `summary.json` into the base directory.
    pub fn run(&self) -> Result<TuningReport, PipelineError> {
        if !self.store.is_empty() {
            return Err(PipelineError::AlreadyRun);
        }
        let config = &self.config;

        let validator: &dyn DeviceValidator = if config.dry_run {
            info!("dry run: skipping device validation");
            &AssumeReachable
        } else {
            self.validator.as_ref()
        };
        let pool = Arc::new(DeviceSlotPool::new(
            config.devices.iter().map(String::as_str),
            validator,
        )?);

        if config.runs_model_phases() {
            if config.model_inputs.is_empty() {
                return Err(PipelineError::NoModelInputs(config.stop_after));
            }
            if let Some(missing) = config.model_inputs.iter().find(|p| !p.exists()) {
                return Err(PipelineError::MissingModelInput(missing.clone()));
            }
        }

        config.paths.ensure_dirs()?;

        let executor = ParallelExecutor::new(
            Arc::clone(&pool),
            Arc::clone(&self.store),
            JobRunner::new(),
            ExecutorSettings {
                compile: config.compile.clone(),
                benchmark: config.benchmark.clone(),
                artifacts: ArtifactLayout::new(
                    &config.paths.compiled_dir,
                    config.artifact_extension.as_str(),
                ),
                compile_timeout: config.compile_timeout,
                jobs: config.jobs,
                show_progress: config.show_progress,
            },
        )?;
        let plan = PhasePlan {
            stop_after: config.stop_after,
            num_dispatch_candidates: config.num_dispatch_candidates,
            num_model_candidates: config.num_model_candidates,
            specs_dir: config.paths.specs_dir.clone(),
            model_inputs: config.model_inputs.clone(),
        };
        info!(
            base_dir = %config.paths.base_dir.display(),
            devices = pool.capacity(),
            parallelism = executor.parallelism(),
            stop_after = %config.stop_after,
            "starting tuning run"
        );

        let outcome = PhaseController::new(
            &plan,
            &self.store,
            &executor,
            self.strategy.as_ref(),
            self.generator.as_ref(),
            &self.abort,
        )
        .run()?;

        let meta = ReportMeta::new(
            &config.paths.base_dir,
            pool.device_ids().to_vec(),
            config.stop_after,
        );
        let report = build_report(meta, &outcome, self.store.trackers());
        let json = generate_json_report(&report)?;
        std::fs::write(&config.paths.summary, json).map_err(|source| PipelineError::Io {
            path: config.paths.summary.clone(),
            source,
        })?;
        info!(
            phase = %outcome.phase(),
            survivors = outcome.survivors().len(),
            summary = %config.paths.summary.display(),
            "tuning run finished"
        );

        Ok(report)
    }
}
