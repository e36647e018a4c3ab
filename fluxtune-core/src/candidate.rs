//! Candidate identity and provenance

use crate::result::{BenchmarkResult, CompileResult, JobStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier assigned by the [`CandidateStore`](crate::CandidateStore) in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub u32);

impl CandidateId {
    /// Position of the candidate in its store.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Granularity a candidate is compiled and measured at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    /// A single dispatch compiled in isolation
    Dispatch,
    /// A full model compiled with a dispatch candidate's spec embedded
    Model,
}

impl CandidateKind {
    /// Lowercase name used in artifact paths and logs
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateKind::Dispatch => "dispatch",
            CandidateKind::Model => "model",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate before the store has assigned it an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCandidate {
    /// Dispatch or model
    pub kind: CandidateKind,
    /// Tuning spec this candidate was generated from
    pub spec: PathBuf,
    /// File handed to the compiler
    pub input: PathBuf,
    /// Dispatch candidate a model candidate was built from
    pub derived_from: Option<CandidateId>,
}

impl NewCandidate {
    /// A dispatch candidate compiles its own spec.
    pub fn dispatch(spec: impl Into<PathBuf>) -> Self {
        let spec = spec.into();
        Self {
            kind: CandidateKind::Dispatch,
            input: spec.clone(),
            spec,
            derived_from: None,
        }
    }

    /// A model candidate compiles `input` with the spec of dispatch candidate `source`.
    pub fn model(source: &Candidate, input: impl Into<PathBuf>) -> Self {
        Self {
            kind: CandidateKind::Model,
            spec: source.spec.clone(),
            input: input.into(),
            derived_from: Some(source.id),
        }
    }
}

/// A registered candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Store-assigned identifier
    pub id: CandidateId,
    /// Dispatch or model
    pub kind: CandidateKind,
    /// Tuning spec this candidate was generated from
    pub spec: PathBuf,
    /// File handed to the compiler
    pub input: PathBuf,
    /// Dispatch candidate a model candidate was built from (by id, not owned)
    pub derived_from: Option<CandidateId>,
}

impl Candidate {
    pub(crate) fn from_new(id: CandidateId, new: NewCandidate) -> Self {
        Self {
            id,
            kind: new.kind,
            spec: new.spec,
            input: new.input,
            derived_from: new.derived_from,
        }
    }
}

/// A candidate together with everything measured for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTracker {
    /// The candidate itself
    pub candidate: Candidate,
    /// Written once by the compile phase the candidate takes part in
    pub compile: Option<CompileResult>,
    /// Written once by the benchmark phase; requires a successful compile
    pub benchmark: Option<BenchmarkResult>,
}

impl CandidateTracker {
    pub(crate) fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            compile: None,
            benchmark: None,
        }
    }

    /// Shorthand for `self.candidate.id`
    pub fn id(&self) -> CandidateId {
        self.candidate.id
    }

    /// Artifact of a successful compile
    pub fn compiled_artifact(&self) -> Option<&Path> {
        match &self.compile {
            Some(result) if result.status == JobStatus::Success => result.artifact.as_deref(),
            _ => None,
        }
    }

    /// Latency of a successful benchmark
    pub fn latency_ms(&self) -> Option<f64> {
        match &self.benchmark {
            Some(result) if result.status == JobStatus::Success => result.latency_ms,
            _ => None,
        }
    }
}
