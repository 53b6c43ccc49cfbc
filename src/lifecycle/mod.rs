// Lifecycle rules for missions and judging steps
//
// Each status enum carries a static transition table. Validation is pure: it never
// touches storage and never applies the transition.

pub mod derivation;
pub mod mission;
pub mod step;

use std::fmt;
use thiserror::Error;

pub use derivation::derive_mission_status;
pub use mission::MissionStateMachine;
pub use step::StepStateMachine;

/// A status type with a fixed table of allowed successors
pub trait Lifecycle: Copy + Eq + fmt::Debug + fmt::Display + 'static {
    /// Human name of the entity the status belongs to, used in error messages
    const SUBJECT: &'static str;

    fn allowed_transitions(self) -> &'static [Self];

    fn can_transition_to(self, target: Self) -> bool {
        self.allowed_transitions().contains(&target)
    }

    fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move {subject} from {from} to {to}; allowed: {{{}}}", .allowed.join(", "))]
pub struct TransitionError {
    pub subject: &'static str,
    pub from: String,
    pub to: String,
    pub allowed: Vec<String>,
}

pub fn validate_transition<S: Lifecycle>(current: S, target: S) -> Result<(), TransitionError> {
    if current.can_transition_to(target) {
        return Ok(());
    }

    Err(TransitionError {
        subject: S::SUBJECT,
        from: current.to_string(),
        to: target.to_string(),
        allowed: current
            .allowed_transitions()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}
