//! Bridge pipeline state machine.
//!
//! Ensures only one location + weather pipeline runs at a time.

/// Pipeline state; anything other than `Idle` means a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Idle,
    Locating,
    Fetching,
}

impl BridgeState {
    /// True if a new trigger may start a pipeline.
    pub fn can_accept_trigger(self) -> bool {
        matches!(self, BridgeState::Idle)
    }

    /// State after a trigger was accepted.
    pub fn on_trigger_accepted(self) -> Self {
        BridgeState::Locating
    }

    /// State after the location service produced a fix.
    pub fn on_location_resolved(self) -> Self {
        BridgeState::Fetching
    }

    /// State after the pipeline ended, whatever the outcome.
    pub fn on_finished(self) -> Self {
        BridgeState::Idle
    }
}
