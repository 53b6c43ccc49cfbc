// Core types for missions, judging steps and the people working on them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub type UserId = i64;
pub type ProductId = String;
pub type MissionId = String;
pub type StepId = String;
pub type MessageId = String;
pub type NotificationId = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum whose wire name is its SCREAMING_SNAKE_CASE form.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

named_enum! {
    /// Role of a user in the organisation
    UserRole, "user role" {
        Admin => "ADMIN",
        Judge => "JUDGE",
        User => "USER",
        /// Read-only; never an assignee or a judge
        Observer => "OBSERVER",
    }
}

named_enum! {
    Priority, "priority" {
        Normal => "NORMAL",
        Urgent => "URGENT",
    }
}

named_enum! {
    /// Lifecycle of a mission
    MissionStatus, "mission status" {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Judging => "JUDGING",
        NeedsFix => "NEEDS_FIX",
        Done => "DONE",
    }
}

named_enum! {
    /// Lifecycle of a single judging step
    StepStatus, "step status" {
        NotDone => "NOT_DONE",
        WaitingJudge => "WAITING_JUDGE",
        NeedsFix => "NEEDS_FIX",
        Approved => "APPROVED",
    }
}

named_enum! {
    NotificationType, "notification type" {
        Chat => "CHAT",
        Approval => "APPROVAL",
        Fix => "FIX",
        Assignment => "ASSIGNMENT",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl UserRole {
    pub fn is_observer(self) -> bool {
        matches!(self, UserRole::Observer)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
}

/// A work area; products nest through `parent_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ProductId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub title: String,
    pub description: String,
    pub status: MissionStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub assignee_id: Option<UserId>,
    pub creator_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    pub fn is_assignee(&self, user_id: UserId) -> bool {
        self.assignee_id == Some(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgingStep {
    pub id: StepId,
    pub mission_id: MissionId,
    pub title: String,
    pub status: StepStatus,
    /// Position within the mission, unique and ascending from 1
    pub order: u32,
    pub judge_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub mission_id: MissionId,
    pub step_id: Option<StepId>,
    pub sender_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub text: String,
    pub recipient_id: UserId,
    pub sender_id: Option<UserId>,
    pub mission_id: Option<MissionId>,
    pub step_id: Option<StepId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification fields supplied by a listener; id, read flag and timestamp are filled in on create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationType,
    pub text: String,
    pub recipient_id: UserId,
    pub sender_id: Option<UserId>,
    pub mission_id: Option<MissionId>,
    pub step_id: Option<StepId>,
}

/// Input for creating a mission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMission {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    pub product_id: ProductId,
}

/// Partial update of a mission's editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
}

impl MissionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assignee_id.is_none()
    }
}

/// Generate an entity id: a short prefix plus eight hex digits of a v4 UUID
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &uuid[..8])
}

pub fn new_mission_id() -> MissionId {
    generate_id("m")
}

pub fn new_step_id() -> StepId {
    generate_id("js")
}

pub fn new_message_id() -> MessageId {
    generate_id("c")
}

pub fn new_notification_id() -> NotificationId {
    generate_id("n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_round_trip_through_from_str() {
        for status in StepStatus::ALL {
            assert_eq!(status.as_str().parse::<StepStatus>().unwrap(), *status);
        }
        assert_eq!("in_progress".parse::<MissionStatus>().unwrap(), MissionStatus::InProgress);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = "FINISHED".parse::<StepStatus>().unwrap_err();
        assert_eq!(err.kind, "step status");
        assert_eq!(err.to_string(), "unknown step status 'FINISHED'");
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&StepStatus::WaitingJudge).unwrap();
        assert_eq!(json, "\"WAITING_JUDGE\"");
        let role: UserRole = serde_json::from_str("\"OBSERVER\"").unwrap();
        assert!(role.is_observer());
    }

    #[test]
    fn test_generated_ids_carry_prefix() {
        let id = new_step_id();
        assert!(id.starts_with("js-"));
        assert_eq!(id.len(), "js-".len() + 8);
        assert_ne!(new_mission_id(), new_mission_id());
    }

    #[test]
    fn test_mission_patch_is_empty() {
        assert!(MissionPatch::default().is_empty());
        let patch = MissionPatch {
            priority: Some(Priority::Urgent),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
