use crate::domain::{MissionStatus, StepStatus};

/// Compute the mission status implied by its judging steps.
///
/// First match wins: all approved, any needing a fix, any waiting for a judge,
/// otherwise in progress. Returns `None` for a mission without steps. The result is a
/// projection and is written without consulting the mission state machine.
pub fn derive_mission_status(steps: &[StepStatus]) -> Option<MissionStatus> {
    if steps.is_empty() {
        return None;
    }

    let status = if steps.iter().all(|s| *s == StepStatus::Approved) {
        MissionStatus::Done
    } else if steps.contains(&StepStatus::NeedsFix) {
        MissionStatus::NeedsFix
    } else if steps.contains(&StepStatus::WaitingJudge) {
        MissionStatus::Judging
    } else {
        MissionStatus::InProgress
    };

    Some(status)
}
