//! Tuning phases
//!
//! A run walks [`Phase::ALL`] in order and stops after the configured phase.
//! Truncation is an index comparison, never scattered early returns.

use crate::candidate::CandidateKind;
use crate::result::JobKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One step of the tuning pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Produce dispatch candidates from the generation strategy
    GenerateCandidates,
    /// Compile every generated dispatch candidate
    CompileDispatches,
    /// Benchmark compiled dispatches and keep the top-K
    BenchmarkDispatches,
    /// Embed surviving dispatch specs into model candidates and compile them
    CompileModels,
    /// Benchmark compiled models and keep the top-K
    BenchmarkModels,
}

/// Error for a phase name that matches none of the five phases
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase '{0}' (expected one of: generate_candidates, compile_dispatches, benchmark_dispatches, compile_models, benchmark_models)")]
pub struct UnknownPhase(pub String);

impl Phase {
    /// Every phase in execution order
    pub const ALL: [Phase; 5] = [
        Phase::GenerateCandidates,
        Phase::CompileDispatches,
        Phase::BenchmarkDispatches,
        Phase::CompileModels,
        Phase::BenchmarkModels,
    ];

    /// Position in [`Phase::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Phases executed by a run that stops after `self`
    pub fn up_to(self) -> &'static [Phase] {
        &Self::ALL[..=self.index()]
    }

    /// Identifier used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::GenerateCandidates => "generate_candidates",
            Phase::CompileDispatches => "compile_dispatches",
            Phase::BenchmarkDispatches => "benchmark_dispatches",
            Phase::CompileModels => "compile_models",
            Phase::BenchmarkModels => "benchmark_models",
        }
    }

    /// External job run by this phase, if any
    pub fn job_kind(self) -> Option<JobKind> {
        match self {
            Phase::GenerateCandidates => None,
            Phase::CompileDispatches | Phase::CompileModels => Some(JobKind::Compile),
            Phase::BenchmarkDispatches | Phase::BenchmarkModels => Some(JobKind::Benchmark),
        }
    }

    /// Kind of candidate this phase operates on
    pub fn candidate_kind(self) -> CandidateKind {
        match self {
            Phase::GenerateCandidates | Phase::CompileDispatches | Phase::BenchmarkDispatches => {
                CandidateKind::Dispatch
            }
            Phase::CompileModels | Phase::BenchmarkModels => CandidateKind::Model,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == normalized)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}
