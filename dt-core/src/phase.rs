use serde::{Deserialize, Serialize};

/// Top-level phase of a session run.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Instructions,
    Running,
    Exit,
    ExitFailure,
}

impl SessionPhase {
    pub fn is_instructions(&self) -> bool {
        matches!(self, Self::Instructions)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::ExitFailure)
    }

    /// Legal transitions. `Exit` is terminal; the only way back is from a
    /// failed training run to its instructions.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Instructions, Running)
                | (Running, Exit)
                | (Running, ExitFailure)
                | (ExitFailure, Instructions)
        )
    }
}

/// How a session run ended, as reported to the caller.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionOutcome {
    Success,
    Failure,
    Interrupted,
}
