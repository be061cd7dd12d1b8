use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Description,
    Planning,
    Execution,
    Cleanup,
    Complete,
}

/// Every legal edge of the lifecycle graph. The single backward edge
/// re-opens a finished feature for improvement.
const TRANSITIONS: &[(Phase, Phase)] = &[
    (Phase::Discovery, Phase::Description),
    (Phase::Description, Phase::Planning),
    (Phase::Planning, Phase::Execution),
    (Phase::Execution, Phase::Cleanup),
    (Phase::Cleanup, Phase::Complete),
    (Phase::Complete, Phase::Description),
];

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Discovery,
            Phase::Description,
            Phase::Planning,
            Phase::Execution,
            Phase::Cleanup,
            Phase::Complete,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Linear successor; `None` for `Complete`.
    pub fn next(self) -> Option<Phase> {
        Phase::all().get(self.index() + 1).copied()
    }

    /// Linear predecessor; `None` for `Discovery`.
    pub fn previous(self) -> Option<Phase> {
        self.index()
            .checked_sub(1)
            .and_then(|i| Phase::all().get(i).copied())
    }

    pub fn can_transition_to(self, target: Phase) -> bool {
        TRANSITIONS.contains(&(self, target))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Description => "description",
            Phase::Planning => "planning",
            Phase::Execution => "execution",
            Phase::Cleanup => "cleanup",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovery" => Ok(Phase::Discovery),
            "description" => Ok(Phase::Description),
            "planning" => Ok(Phase::Planning),
            "execution" => Ok(Phase::Execution),
            "cleanup" => Ok(Phase::Cleanup),
            "complete" => Ok(Phase::Complete),
            _ => Err(crate::error::FlowError::UnknownPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
