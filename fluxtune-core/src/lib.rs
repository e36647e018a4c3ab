#![warn(missing_docs)]
//! fluxtune Core - Candidate Model
//!
//! This crate holds the state shared by every stage of a tuning run:
//! - `Candidate` and `CandidateTracker` with compile/benchmark result slots
//! - `CandidateStore`, the single owner of all trackers of a run
//! - `Phase`, the ordered five-phase state machine with stop-after truncation
//! - `TuningStrategy` / `CandidateGenerator`, the seams supplied by callers

mod candidate;
mod outcome;
mod phase;
mod result;
mod store;
mod strategy;

pub use candidate::{Candidate, CandidateId, CandidateKind, CandidateTracker, NewCandidate};
pub use outcome::RunOutcome;
pub use phase::{Phase, UnknownPhase};
pub use result::{BenchmarkResult, CompileResult, JobKind, JobOutcome, JobStatus};
pub use store::{CandidateStore, StoreError};
pub use strategy::{CandidateGenerator, StaticStrategy, TuningStrategy};
