use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade orchestrator state machine states.
///
/// Every tick starts in `AwaitingPartnerPresence` and walks the guards in order until it
/// settles in `ReadyToOpen`, `IdleWhileTrading`, or one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrchestratorState {
    /// Checking that the selected user is still in the room
    AwaitingPartnerPresence,
    /// Checking that the selected item is still available
    AwaitingItemPresence,
    /// Trade-open command goes out this tick
    ReadyToOpen,
    /// Not the active sender, or a trade is already open
    IdleWhileTrading,
    /// Selected user left the room
    TerminatedTargetLeft,
    /// Selected item is gone
    TerminatedItemGone,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::AwaitingPartnerPresence => "awaiting-partner-presence",
            OrchestratorState::AwaitingItemPresence => "awaiting-item-presence",
            OrchestratorState::ReadyToOpen => "ready-to-open",
            OrchestratorState::IdleWhileTrading => "idle-while-trading",
            OrchestratorState::TerminatedTargetLeft => "terminated-target-left",
            OrchestratorState::TerminatedItemGone => "terminated-item-gone",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: OrchestratorState) -> bool {
        use OrchestratorState::*;

        match (self, target) {
            (AwaitingPartnerPresence, AwaitingItemPresence) => true,
            (AwaitingPartnerPresence, TerminatedTargetLeft) => true,

            (AwaitingItemPresence, ReadyToOpen) => true,
            (AwaitingItemPresence, IdleWhileTrading) => true,
            (AwaitingItemPresence, TerminatedItemGone) => true,

            // Next tick
            (ReadyToOpen, AwaitingPartnerPresence) => true,
            (IdleWhileTrading, AwaitingPartnerPresence) => true,

            _ => false,
        }
    }

    /// Is this a terminal state for the run?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::TerminatedTargetLeft | OrchestratorState::TerminatedItemGone
        )
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State transition event (for logging/debugging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StateTransition {
    pub fn new(from: OrchestratorState, to: OrchestratorState) -> Self {
        Self {
            from,
            to,
            timestamp: chrono::Utc::now(),
        }
    }
}
