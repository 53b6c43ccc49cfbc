use super::{validate_transition, Lifecycle, TransitionError};
use crate::domain::StepStatus;

impl Lifecycle for StepStatus {
    const SUBJECT: &'static str = "step";

    fn allowed_transitions(self) -> &'static [StepStatus] {
        match self {
            StepStatus::NotDone => &[StepStatus::WaitingJudge],
            StepStatus::WaitingJudge => &[StepStatus::Approved, StepStatus::NeedsFix],
            StepStatus::NeedsFix => &[StepStatus::WaitingJudge],
            StepStatus::Approved => &[],
        }
    }
}

/// Validates judging step transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStateMachine;

impl StepStateMachine {
    pub fn validate_transition(
        &self,
        current: StepStatus,
        target: StepStatus,
    ) -> Result<(), TransitionError> {
        validate_transition(current, target)
    }

    pub fn allowed_targets(&self, current: StepStatus) -> &'static [StepStatus] {
        current.allowed_transitions()
    }
}
