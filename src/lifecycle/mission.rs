use super::{validate_transition, Lifecycle, TransitionError};
use crate::domain::MissionStatus;

impl Lifecycle for MissionStatus {
    const SUBJECT: &'static str = "mission";

    fn allowed_transitions(self) -> &'static [MissionStatus] {
        match self {
            MissionStatus::Pending => &[MissionStatus::InProgress],
            MissionStatus::InProgress => &[MissionStatus::Judging],
            MissionStatus::Judging => &[MissionStatus::NeedsFix, MissionStatus::Done],
            MissionStatus::NeedsFix => &[MissionStatus::Judging],
            MissionStatus::Done => &[],
        }
    }
}

/// Validates manual mission transitions.
///
/// Statuses derived from judging steps bypass this machine, see
/// [`derive_mission_status`](super::derive_mission_status).
#[derive(Debug, Clone, Copy, Default)]
pub struct MissionStateMachine;

impl MissionStateMachine {
    pub fn validate_transition(
        &self,
        current: MissionStatus,
        target: MissionStatus,
    ) -> Result<(), TransitionError> {
        validate_transition(current, target)
    }

    pub fn allowed_targets(&self, current: MissionStatus) -> &'static [MissionStatus] {
        current.allowed_transitions()
    }
}
