//! Report Data Structures

use chrono::{DateTime, Utc};
use fluxtune_core::{CandidateId, CandidateKind, CandidateTracker, JobStatus, Phase, RunOutcome};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bumped whenever the JSON layout changes incompatibly
const SCHEMA_VERSION: u32 = 1;

/// Complete record of one tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    /// Run metadata
    pub meta: ReportMeta,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Survivors of the last executed phase, best first
    pub survivors: Vec<SurvivorEntry>,
    /// Result counts per candidate kind
    pub summary: Vec<KindSummary>,
    /// Every tracker of the run, failures included, in insertion order
    pub history: Vec<CandidateTracker>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// JSON layout version
    pub schema_version: u32,
    /// fluxtune version that produced the report
    pub version: String,
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// Working directory of the run
    pub base_dir: PathBuf,
    /// Device identifiers the run used
    pub devices: Vec<String>,
    /// Configured stop-after phase
    pub stop_after: Phase,
    /// Phases that actually ran, filled in by [`build_report`]
    pub executed_phases: Vec<Phase>,
}

impl ReportMeta {
    /// Metadata stamped with the current time
    pub fn new(base_dir: impl Into<PathBuf>, devices: Vec<String>, stop_after: Phase) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            base_dir: base_dir.into(),
            devices,
            stop_after,
            executed_phases: Vec::new(),
        }
    }
}

/// One ranked survivor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivorEntry {
    /// 1-based position in the final ranking
    pub rank: usize,
    /// Candidate id
    pub id: CandidateId,
    /// Dispatch or model
    pub kind: CandidateKind,
    /// Tuning spec the candidate came from
    pub spec: PathBuf,
    /// Dispatch candidate a model candidate was built from
    pub derived_from: Option<CandidateId>,
    /// Measured latency, absent when the last phase was not a benchmark
    pub latency_ms: Option<f64>,
}

/// Result counts for one candidate kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSummary {
    /// Candidate kind counted
    pub kind: CandidateKind,
    /// Candidates registered
    pub total: usize,
    /// Compiled successfully
    pub compiled: usize,
    /// Compile exited non-zero or produced nothing
    pub compile_failures: usize,
    /// Compile hit its timeout
    pub compile_timeouts: usize,
    /// Benchmarked successfully
    pub benchmarked: usize,
    /// Benchmark failed or printed nothing parsable
    pub benchmark_failures: usize,
    /// Benchmark hit its timeout
    pub benchmark_timeouts: usize,
}

impl KindSummary {
    fn new(kind: CandidateKind) -> Self {
        Self {
            kind,
            total: 0,
            compiled: 0,
            compile_failures: 0,
            compile_timeouts: 0,
            benchmarked: 0,
            benchmark_failures: 0,
            benchmark_timeouts: 0,
        }
    }

    fn count(&mut self, tracker: &CandidateTracker) {
        self.total += 1;
        match tracker.compile.as_ref().map(|r| r.status) {
            Some(JobStatus::Success) => self.compiled += 1,
            Some(JobStatus::Failure) => self.compile_failures += 1,
            Some(JobStatus::Timeout) => self.compile_timeouts += 1,
            None => {}
        }
        match tracker.benchmark.as_ref().map(|r| r.status) {
            Some(JobStatus::Success) => self.benchmarked += 1,
            Some(JobStatus::Failure) => self.benchmark_failures += 1,
            Some(JobStatus::Timeout) => self.benchmark_timeouts += 1,
            None => {}
        }
    }
}

/// Build a report from the outcome of a run and its full tracker history.
///
/// `history` must be the store's snapshot in insertion order, so that a
/// candidate id doubles as its index.
pub fn build_report(
    mut meta: ReportMeta,
    outcome: &RunOutcome,
    history: Vec<CandidateTracker>,
) -> TuningReport {
    meta.executed_phases = outcome.phase().up_to().to_vec();

    let survivors = outcome
        .survivors()
        .iter()
        .filter_map(|id| history.get(id.index()))
        .enumerate()
        .map(|(i, tracker)| SurvivorEntry {
            rank: i + 1,
            id: tracker.id(),
            kind: tracker.candidate.kind,
            spec: tracker.candidate.spec.clone(),
            derived_from: tracker.candidate.derived_from,
            latency_ms: tracker.latency_ms(),
        })
        .collect();

    let mut summary = Vec::new();
    for kind in [CandidateKind::Dispatch, CandidateKind::Model] {
        let mut counts = KindSummary::new(kind);
        for tracker in history.iter().filter(|t| t.candidate.kind == kind) {
            counts.count(tracker);
        }
        if counts.total > 0 {
            summary.push(counts);
        }
    }

    TuningReport {
        meta,
        outcome: outcome.clone(),
        survivors,
        summary,
        history,
    }
}
