//! Saga run state machine.

use serde::{Deserialize, Serialize};

/// The state of one saga run.
///
/// State transitions:
/// ```text
/// Pending ──► Running ──┬──► Completed
///                       └──► Compensating ──┬──► Compensated
///                                           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// The run has been created but no step dispatched.
    #[default]
    Pending,

    /// Steps are being dispatched.
    Running,

    /// A step failed or the run was cancelled; completed steps are being undone.
    Compensating,

    /// Every step completed (terminal state).
    Completed,

    /// Every completed step was undone (terminal state).
    Compensated,

    /// At least one compensation failed; manual remediation needed (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if the run can start dispatching steps.
    pub fn can_run(&self) -> bool {
        matches!(self, SagaState::Pending)
    }

    /// Returns true if the run can switch to compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Completed | SagaState::Compensated | SagaState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "Pending",
            SagaState::Running => "Running",
            SagaState::Compensating => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Compensated => "Compensated",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
