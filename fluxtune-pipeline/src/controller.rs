//! Phase Controller
//!
//! Walks the phases up to the stop-after phase:
//!
//! ```text
//! generate_candidates ─► compile_dispatches ─► benchmark_dispatches ─┐
//!                                                     top-K          │
//!        ┌───────────────────────────────────────────────────────────┘
//!        ▼
//! compile_models ─► benchmark_models
//!                       top-K
//! ```
//!
//! Each phase consumes the survivors of the previous one. A phase that leaves
//! no survivors ends the run with [`RunOutcome::Empty`]; later phases are not
//! entered. Abort requests are honoured between phases only.

use crate::error::PipelineError;
use crate::selection::select_top_k;
use fluxtune_core::{
    Candidate, CandidateGenerator, CandidateKind, CandidateStore, CandidateTracker, JobKind,
    NewCandidate, Phase, RunOutcome, TuningStrategy,
};
use fluxtune_runner::ParallelExecutor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// What a run does, independent of how jobs are executed
#[derive(Debug, Clone)]
pub struct PhasePlan {
    /// Last phase to run
    pub stop_after: Phase,
    /// Dispatch candidates kept after benchmark_dispatches (`None` keeps all)
    pub num_dispatch_candidates: Option<usize>,
    /// Model candidates kept after benchmark_models (`None` keeps all)
    pub num_model_candidates: Option<usize>,
    /// Directory handed to the candidate generator
    pub specs_dir: PathBuf,
    /// Full-program inputs each surviving dispatch candidate is applied to
    pub model_inputs: Vec<PathBuf>,
}

impl PhasePlan {
    fn top_k(&self, phase: Phase) -> Option<usize> {
        match phase {
            Phase::BenchmarkDispatches => self.num_dispatch_candidates,
            Phase::BenchmarkModels => self.num_model_candidates,
            _ => None,
        }
    }
}

/// Drives one tuning run through its phases
pub struct PhaseController<'a> {
    plan: &'a PhasePlan,
    store: &'a CandidateStore,
    executor: &'a ParallelExecutor,
    strategy: &'a dyn TuningStrategy,
    generator: &'a dyn CandidateGenerator,
    abort: &'a AtomicBool,
}

impl<'a> PhaseController<'a> {
    /// Controller over an empty store
    pub fn new(
        plan: &'a PhasePlan,
        store: &'a CandidateStore,
        executor: &'a ParallelExecutor,
        strategy: &'a dyn TuningStrategy,
        generator: &'a dyn CandidateGenerator,
        abort: &'a AtomicBool,
    ) -> Self {
        Self {
            plan,
            store,
            executor,
            strategy,
            generator,
            abort,
        }
    }

    /// Run every phase up to and including the stop-after phase.
    pub fn run(&self) -> Result<RunOutcome, PipelineError> {
        let mut survivors: Vec<Candidate> = Vec::new();

        for &phase in self.plan.stop_after.up_to() {
            if self.abort.load(Ordering::SeqCst) {
                warn!(phase = %phase, "abort requested");
                return Err(PipelineError::Aborted(phase));
            }
            info!(phase = %phase, inputs = survivors.len(), "entering phase");

            survivors = match phase {
                Phase::GenerateCandidates => self.generate()?,
                Phase::CompileDispatches => self.compile(phase, &survivors)?,
                Phase::BenchmarkDispatches | Phase::BenchmarkModels => {
                    self.benchmark(phase, &survivors)?
                }
                Phase::CompileModels => {
                    let models = self.materialize_models(&survivors)?;
                    self.compile(phase, &models)?
                }
            };

            if survivors.is_empty() {
                warn!(phase = %phase, "no candidate survived");
                return Ok(RunOutcome::Empty { phase });
            }
            info!(phase = %phase, survivors = survivors.len(), "phase complete");
        }

        Ok(RunOutcome::Completed {
            phase: self.plan.stop_after,
            survivors: survivors.iter().map(|c| c.id).collect(),
        })
    }

    fn generate(&self) -> Result<Vec<Candidate>, PipelineError> {
        let specs = self
            .generator
            .generate(&self.plan.specs_dir)
            .map_err(PipelineError::Generator)?;

        if let Some(missing) = specs.iter().find(|spec| !spec.exists()) {
            return Err(PipelineError::MissingSpec(missing.clone()));
        }

        let mut candidates = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = self.store.add(NewCandidate::dispatch(spec));
            candidates.push(self.store.get(id)?.candidate);
        }
        info!(candidates = candidates.len(), "candidates generated");
        Ok(candidates)
    }

    fn compile(&self, phase: Phase, inputs: &[Candidate]) -> Result<Vec<Candidate>, PipelineError> {
        let outcomes = self
            .executor
            .execute(inputs, JobKind::Compile, phase, self.strategy)?;
        Ok(inputs
            .iter()
            .filter(|c| outcomes.get(&c.id).is_some_and(|o| o.status().is_success()))
            .cloned()
            .collect())
    }

    fn benchmark(
        &self,
        phase: Phase,
        inputs: &[Candidate],
    ) -> Result<Vec<Candidate>, PipelineError> {
        self.executor
            .execute(inputs, JobKind::Benchmark, phase, self.strategy)?;

        let trackers = inputs
            .iter()
            .map(|c| self.store.get(c.id))
            .collect::<Result<Vec<CandidateTracker>, _>>()?;
        let k = self.plan.top_k(phase);
        let selected = select_top_k(&trackers, k);
        info!(
            phase = %phase,
            measured = trackers.iter().filter(|t| t.latency_ms().is_some()).count(),
            top_k = ?k,
            selected = ?selected,
            "top candidates selected"
        );

        Ok(selected
            .into_iter()
            .filter_map(|id| {
                trackers
                    .iter()
                    .find(|t| t.id() == id)
                    .map(|t| t.candidate.clone())
            })
            .collect())
    }

    /// One model candidate per (surviving dispatch, model input) pair, in
    /// ranking order.
    fn materialize_models(&self, dispatches: &[Candidate]) -> Result<Vec<Candidate>, PipelineError> {
        let mut models = Vec::with_capacity(dispatches.len() * self.plan.model_inputs.len());
        for dispatch in dispatches {
            debug_assert_eq!(dispatch.kind, CandidateKind::Dispatch);
            for input in &self.plan.model_inputs {
                let id = self.store.add(NewCandidate::model(dispatch, input));
                models.push(self.store.get(id)?.candidate);
            }
        }
        info!(
            dispatches = dispatches.len(),
            models = models.len(),
            "model candidates materialized"
        );
        Ok(models)
    }
}
