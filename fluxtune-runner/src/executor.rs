//! Parallel Executor
//!
//! Fans the candidates of one phase out over the device pool:
//!
//! ```text
//! candidates ──► rayon pool (≤ parallelism threads)
//!                    │  acquire device ─► JobRunner ─► release device
//!                    ▼
//!             CandidateStore.record_*  (as each job completes)
//!                    │
//!                    ▼
//!          BTreeMap<CandidateId, JobOutcome>
//! ```
//!
//! Per-candidate failures never leave this module as errors; they are
//! recorded results. Only store violations and a closed device pool are
//! returned as [`ExecutorError`]. Failed candidates are not retried.

use crate::command::{ArtifactLayout, RenderContext, ToolCommand};
use crate::device::{DeviceError, DeviceSlotPool};
use crate::job::JobRunner;
use fluxtune_core::{
    Candidate, CandidateId, CandidateStore, JobKind, JobOutcome, JobStatus, Phase, StoreError,
    TuningStrategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a phase. Job failures are results, not errors.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Recording into the store was rejected
    #[error("Candidate store error: {0}")]
    Store(#[from] StoreError),

    /// No device could be acquired
    #[error("Device pool error: {0}")]
    Device(#[from] DeviceError),

    /// The worker threads could not be started
    #[error("Failed to build job pool: {0}")]
    ThreadPool(String),
}

/// Tools and limits for the jobs of a run
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Compiler invocation template
    pub compile: ToolCommand,
    /// Benchmark tool invocation template
    pub benchmark: ToolCommand,
    /// Where compile jobs write their artifacts
    pub artifacts: ArtifactLayout,
    /// Upper bound on a single compile job
    pub compile_timeout: Duration,
    /// Cap on concurrent jobs; the device count applies when lower or unset
    pub jobs: Option<usize>,
    /// Draw a progress bar per phase
    pub show_progress: bool,
}

/// Runs the jobs of one phase concurrently, one device per job
pub struct ParallelExecutor {
    pool: Arc<DeviceSlotPool>,
    store: Arc<CandidateStore>,
    runner: JobRunner,
    settings: ExecutorSettings,
    threads: rayon::ThreadPool,
    parallelism: usize,
}

impl ParallelExecutor {
    /// Executor with `min(devices, settings.jobs)` workers
    pub fn new(
        pool: Arc<DeviceSlotPool>,
        store: Arc<CandidateStore>,
        runner: JobRunner,
        settings: ExecutorSettings,
    ) -> Result<Self, ExecutorError> {
        let devices = pool.capacity();
        let parallelism = settings
            .jobs
            .map_or(devices, |jobs| jobs.min(devices))
            .max(1);
        let threads = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("fluxtune-job-{i}"))
            .build()
            .map_err(|e| ExecutorError::ThreadPool(e.to_string()))?;

        Ok(Self {
            pool,
            store,
            runner,
            settings,
            threads,
            parallelism,
        })
    }

    /// Number of jobs that may run at once
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run a `kind` job for every candidate of `phase`, recording each result
    /// into the store as it completes.
    pub fn execute(
        &self,
        candidates: &[Candidate],
        kind: JobKind,
        phase: Phase,
        strategy: &dyn TuningStrategy,
    ) -> Result<BTreeMap<CandidateId, JobOutcome>, ExecutorError> {
        if candidates.is_empty() {
            return Ok(BTreeMap::new());
        }

        let (flags, timeout) = match kind {
            JobKind::Compile => (strategy.compile_flags(phase), self.settings.compile_timeout),
            JobKind::Benchmark => (strategy.benchmark_flags(phase), strategy.benchmark_timeout()),
        };
        info!(
            phase = %phase,
            job = %kind,
            candidates = candidates.len(),
            parallelism = self.parallelism,
            timeout_ms = timeout.as_millis() as u64,
            "executing jobs"
        );

        let pb = self.progress_bar(candidates.len(), phase);
        let outcomes: Vec<Result<(CandidateId, JobOutcome), ExecutorError>> =
            self.threads.install(|| {
                candidates
                    .par_iter()
                    .map(|candidate| {
                        let outcome = self.run_one(candidate, kind, &flags, timeout)?;
                        pb.inc(1);
                        Ok((candidate.id, outcome))
                    })
                    .collect()
            });
        pb.finish_and_clear();

        let mut results = BTreeMap::new();
        for outcome in outcomes {
            let (id, outcome) = outcome?;
            results.insert(id, outcome);
        }

        let succeeded = results
            .values()
            .filter(|outcome| outcome.status().is_success())
            .count();
        info!(
            phase = %phase,
            job = %kind,
            succeeded,
            failed = results.len() - succeeded,
            "jobs finished"
        );
        Ok(results)
    }

    fn run_one(
        &self,
        candidate: &Candidate,
        kind: JobKind,
        flags: &[String],
        timeout: Duration,
    ) -> Result<JobOutcome, ExecutorError> {
        let (tool, artifact) = match kind {
            JobKind::Compile => (
                &self.settings.compile,
                self.settings.artifacts.path_for(candidate),
            ),
            JobKind::Benchmark => {
                let tracker = self.store.get(candidate.id)?;
                let artifact: PathBuf = tracker
                    .compiled_artifact()
                    .ok_or(StoreError::NotCompiled(candidate.id))?
                    .to_path_buf();
                (&self.settings.benchmark, artifact)
            }
        };

        let slot = self.pool.acquire()?;
        let command = tool.render(&RenderContext {
            candidate,
            artifact: &artifact,
            device: slot.id(),
            flags,
        });
        let outcome = match kind {
            JobKind::Compile => JobOutcome::Compile(
                self.runner
                    .compile(candidate, &slot, &command, &artifact, timeout),
            ),
            JobKind::Benchmark => {
                JobOutcome::Benchmark(self.runner.benchmark(candidate, &slot, &command, timeout))
            }
        };
        let device = slot.id().to_string();
        self.pool.release(slot);

        match &outcome {
            JobOutcome::Compile(result) => self
                .store
                .record_compile_result(candidate.id, result.clone())?,
            JobOutcome::Benchmark(result) => self
                .store
                .record_benchmark_result(candidate.id, result.clone())?,
        }

        match outcome.status() {
            JobStatus::Success => debug!(
                candidate = %candidate.id,
                device = device.as_str(),
                job = %kind,
                duration_ms = outcome.duration().as_millis() as u64,
                "job succeeded"
            ),
            status => warn!(
                candidate = %candidate.id,
                device = device.as_str(),
                job = %kind,
                status = %status,
                "job did not succeed"
            ),
        }
        Ok(outcome)
    }

    fn progress_bar(&self, len: usize, phase: Phase) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(phase.to_string());
        pb
    }
}
