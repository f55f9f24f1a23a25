use std::fmt;

use crate::error::ErrorKind;

/// Where a fetch attempt currently is.
///
/// Transitions only move forward. `Cancelled` can be entered from any
/// non-terminal stage and nothing leaves a terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    CheckingConnectivity,
    AwaitingLocation,
    AwaitingFetch,
    AwaitingPersist,
    Succeeded,
    Failed(ErrorKind),
    Cancelled,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed(_) | Stage::Cancelled)
    }

    fn order(&self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::CheckingConnectivity => 1,
            Stage::AwaitingLocation => 2,
            Stage::AwaitingFetch => 3,
            Stage::AwaitingPersist => 4,
            Stage::Succeeded | Stage::Failed(_) | Stage::Cancelled => 5,
        }
    }

    pub fn can_advance_to(&self, next: Stage) -> bool {
        !self.is_terminal() && next.order() > self.order()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::CheckingConnectivity => write!(f, "checking connectivity"),
            Stage::AwaitingLocation => write!(f, "awaiting location"),
            Stage::AwaitingFetch => write!(f, "awaiting fetch"),
            Stage::AwaitingPersist => write!(f, "awaiting persist"),
            Stage::Succeeded => write!(f, "succeeded"),
            Stage::Failed(kind) => write!(f, "failed: {}", kind),
            Stage::Cancelled => write!(f, "cancelled"),
        }
    }
}
