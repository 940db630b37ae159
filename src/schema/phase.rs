use serde::{Deserialize, Serialize};

use super::occurrence::SentenceKey;

/// Pedagogical exposure stage within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Baseline,
    Learning,
    Reinforcement,
    Recall,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Baseline,
        Phase::Learning,
        Phase::Reinforcement,
        Phase::Recall,
    ];

    /// Phases that are shown in text, in assignment order.
    pub const EXPOSED: [Phase; 3] = [Phase::Baseline, Phase::Learning, Phase::Reinforcement];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Learning => "learning",
            Self::Reinforcement => "reinforcement",
            Self::Recall => "recall",
        }
    }
}

/// Where a word is shown at each phase. Recall is tested from memory and
/// never has a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePlacement {
    pub baseline: Option<SentenceKey>,
    pub learning: Option<SentenceKey>,
    pub reinforcement: Option<SentenceKey>,
}

impl PhasePlacement {
    /// Assign positions to the exposed phases in order; extra positions are
    /// ignored and missing ones stay empty.
    pub fn from_positions(positions: &[SentenceKey]) -> Self {
        let mut slots = positions.iter().copied();
        Self {
            baseline: slots.next(),
            learning: slots.next(),
            reinforcement: slots.next(),
        }
    }

    pub fn position(&self, phase: Phase) -> Option<SentenceKey> {
        match phase {
            Phase::Baseline => self.baseline,
            Phase::Learning => self.learning,
            Phase::Reinforcement => self.reinforcement,
            Phase::Recall => None,
        }
    }

    /// All four phases with their positions.
    pub fn iter(&self) -> impl Iterator<Item = (Phase, Option<SentenceKey>)> + '_ {
        Phase::ALL.into_iter().map(move |phase| (phase, self.position(phase)))
    }
}
