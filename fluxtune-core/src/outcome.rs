//! Terminal outcome of a tuning run

use crate::candidate::CandidateId;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};

/// How a run that did not hit a fatal error ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    /// `phase` was the last executed phase and left `survivors`, best first for benchmark phases
    Completed {
        /// Last executed phase
        phase: Phase,
        /// Surviving candidates of that phase
        survivors: Vec<CandidateId>,
    },
    /// No candidate survived `phase`; later phases were not run
    Empty {
        /// Phase that produced no survivors
        phase: Phase,
    },
}

impl RunOutcome {
    /// Last executed phase
    pub fn phase(&self) -> Phase {
        match self {
            RunOutcome::Completed { phase, .. } | RunOutcome::Empty { phase } => *phase,
        }
    }

    /// Surviving candidates, empty for [`RunOutcome::Empty`]
    pub fn survivors(&self) -> &[CandidateId] {
        match self {
            RunOutcome::Completed { survivors, .. } => survivors,
            RunOutcome::Empty { .. } => &[],
        }
    }

    /// Whether the run ended because nothing survived
    pub fn is_empty(&self) -> bool {
        matches!(self, RunOutcome::Empty { .. })
    }
}
