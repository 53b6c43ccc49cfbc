use serde::{Deserialize, Serialize};

use crate::domain::{MessageId, MissionId, MissionStatus, StepId, StepStatus, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatusChanged {
    pub step_id: StepId,
    pub mission_id: MissionId,
    pub previous_status: StepStatus,
    pub new_status: StepStatus,
    pub judge_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionStatusChanged {
    pub mission_id: MissionId,
    pub previous_status: MissionStatus,
    pub new_status: MissionStatus,
    pub acting_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionAssigned {
    pub mission_id: MissionId,
    pub previous_assignee_id: Option<UserId>,
    pub new_assignee_id: UserId,
    pub assigned_by_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageSent {
    pub message_id: MessageId,
    pub mission_id: MissionId,
    pub sender_id: UserId,
    pub text: String,
    pub recipient_ids: Vec<UserId>,
}

/// An immutable fact produced once per successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    StepStatusChanged(StepStatusChanged),
    MissionStatusChanged(MissionStatusChanged),
    MissionAssigned(MissionAssigned),
    ChatMessageSent(ChatMessageSent),
}

/// Key used by the bus to route events to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    StepStatusChanged,
    MissionStatusChanged,
    MissionAssigned,
    ChatMessageSent,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StepStatusChanged => "judging.step.updated",
            EventKind::MissionStatusChanged => "mission.status.updated",
            EventKind::MissionAssigned => "mission.assigned",
            EventKind::ChatMessageSent => "chat.message.sent",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::StepStatusChanged(_) => EventKind::StepStatusChanged,
            DomainEvent::MissionStatusChanged(_) => EventKind::MissionStatusChanged,
            DomainEvent::MissionAssigned(_) => EventKind::MissionAssigned,
            DomainEvent::ChatMessageSent(_) => EventKind::ChatMessageSent,
        }
    }

    pub fn mission_id(&self) -> &str {
        match self {
            DomainEvent::StepStatusChanged(e) => &e.mission_id,
            DomainEvent::MissionStatusChanged(e) => &e.mission_id,
            DomainEvent::MissionAssigned(e) => &e.mission_id,
            DomainEvent::ChatMessageSent(e) => &e.mission_id,
        }
    }

    /// Id of the entity the event is about, used when logging delivery failures
    pub fn payload_id(&self) -> &str {
        match self {
            DomainEvent::StepStatusChanged(e) => &e.step_id,
            DomainEvent::MissionStatusChanged(e) => &e.mission_id,
            DomainEvent::MissionAssigned(e) => &e.mission_id,
            DomainEvent::ChatMessageSent(e) => &e.message_id,
        }
    }
}

impl From<StepStatusChanged> for DomainEvent {
    fn from(event: StepStatusChanged) -> Self {
        DomainEvent::StepStatusChanged(event)
    }
}

impl From<MissionStatusChanged> for DomainEvent {
    fn from(event: MissionStatusChanged) -> Self {
        DomainEvent::MissionStatusChanged(event)
    }
}

impl From<MissionAssigned> for DomainEvent {
    fn from(event: MissionAssigned) -> Self {
        DomainEvent::MissionAssigned(event)
    }
}

impl From<ChatMessageSent> for DomainEvent {
    fn from(event: ChatMessageSent) -> Self {
        DomainEvent::ChatMessageSent(event)
    }
}
