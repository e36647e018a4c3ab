//! Candidate Store
//!
//! Append-only owner of every [`CandidateTracker`] produced during a run.
//! Parallel jobs record results concurrently; writes target distinct ids, so a
//! single lock around the whole mapping is all the synchronization needed.

use crate::candidate::{Candidate, CandidateId, CandidateKind, CandidateTracker, NewCandidate};
use crate::result::{BenchmarkResult, CompileResult};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use thiserror::Error;

/// Errors from recording into the store. All of them are programming errors
/// and abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No candidate was registered under this id
    #[error("Unknown candidate id: {0}")]
    UnknownCandidate(CandidateId),

    /// The result slot was already written
    #[error("Candidate {id} already has a {slot} result")]
    AlreadyRecorded {
        /// Candidate whose slot is taken
        id: CandidateId,
        /// `"compile"` or `"benchmark"`
        slot: &'static str,
    },

    /// A benchmark result arrived before a successful compile
    #[error("Candidate {0} has no successful compile result to benchmark")]
    NotCompiled(CandidateId),
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Indexed by `CandidateId::index`
    trackers: Vec<CandidateTracker>,
    by_kind: FxHashMap<CandidateKind, Vec<CandidateId>>,
}

impl StoreInner {
    fn tracker_mut(&mut self, id: CandidateId) -> Result<&mut CandidateTracker, StoreError> {
        self.trackers
            .get_mut(id.index())
            .ok_or(StoreError::UnknownCandidate(id))
    }
}

/// Thread-safe, append-only candidate storage
#[derive(Debug, Default)]
pub struct CandidateStore {
    inner: RwLock<StoreInner>,
}

impl CandidateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a candidate and return its id. Ids follow insertion order.
    pub fn add(&self, new: NewCandidate) -> CandidateId {
        let mut inner = self.inner.write();
        let id = CandidateId(inner.trackers.len() as u32);
        let kind = new.kind;
        inner
            .trackers
            .push(CandidateTracker::new(Candidate::from_new(id, new)));
        inner.by_kind.entry(kind).or_default().push(id);
        id
    }

    /// Record the compile result of `id`. Each candidate is compiled at most once.
    pub fn record_compile_result(
        &self,
        id: CandidateId,
        result: CompileResult,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let tracker = inner.tracker_mut(id)?;
        if tracker.compile.is_some() {
            return Err(StoreError::AlreadyRecorded {
                id,
                slot: "compile",
            });
        }
        tracker.compile = Some(result);
        Ok(())
    }

    /// Record the benchmark result of `id`, which must have compiled successfully.
    pub fn record_benchmark_result(
        &self,
        id: CandidateId,
        result: BenchmarkResult,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let tracker = inner.tracker_mut(id)?;
        if tracker.compiled_artifact().is_none() {
            return Err(StoreError::NotCompiled(id));
        }
        if tracker.benchmark.is_some() {
            return Err(StoreError::AlreadyRecorded {
                id,
                slot: "benchmark",
            });
        }
        tracker.benchmark = Some(result);
        Ok(())
    }

    /// Snapshot of one tracker
    pub fn get(&self, id: CandidateId) -> Result<CandidateTracker, StoreError> {
        self.inner
            .read()
            .trackers
            .get(id.index())
            .cloned()
            .ok_or(StoreError::UnknownCandidate(id))
    }

    /// Snapshot of every tracker of `kind`, in insertion order
    pub fn list_by_kind(&self, kind: CandidateKind) -> Vec<CandidateTracker> {
        let inner = self.inner.read();
        inner
            .by_kind
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .map(|id| inner.trackers[id.index()].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the full history, in insertion order
    pub fn trackers(&self) -> Vec<CandidateTracker> {
        self.inner.read().trackers.clone()
    }

    /// Number of registered candidates
    pub fn len(&self) -> usize {
        self.inner.read().trackers.len()
    }

    /// Whether nothing has been registered yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
