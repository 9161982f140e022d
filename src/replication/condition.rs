//! Pin condition classification

use std::fmt;

use serde::{Deserialize, Serialize};

use super::pin::Pin;

/// Where a pin stands with respect to its replication target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinCondition {
    /// Every allocated peer reports `pinned`
    Healthy,

    /// No errors and at least one copy, but the target is not met yet.
    /// Usually convergence lag; not a repair candidate.
    UnderReplicated,

    /// Needs repair and some peer still holds or is fetching the data.
    /// `recover` can heal it.
    Recoverable,

    /// Needs repair and no peer holds, fetches or queues the data.
    /// Only an external restore brings it back.
    Unrecoverable,
}

impl PinCondition {
    pub fn classify(pin: &Pin) -> Self {
        if pin.needs_repair() {
            if pin.is_lost() {
                PinCondition::Unrecoverable
            } else {
                PinCondition::Recoverable
            }
        } else if pin.is_fully_pinned() {
            PinCondition::Healthy
        } else {
            PinCondition::UnderReplicated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PinCondition::Healthy => "healthy",
            PinCondition::UnderReplicated => "under_replicated",
            PinCondition::Recoverable => "recoverable",
            PinCondition::Unrecoverable => "unrecoverable",
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(
            self,
            PinCondition::Recoverable | PinCondition::Unrecoverable
        )
    }
}

impl fmt::Display for PinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
