// Storage collaborators consumed by the workflow core
//
// The relational layer lives outside this crate. These traits describe what the core
// needs from it; `memory` provides the implementation used by tests and the CLI.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::domain::{
    ChatMessage, JudgingStep, Mission, MissionPatch, MissionStatus, NewNotification,
    Notification, Product, StepStatus, User, UserId,
};

pub use memory::{InMemoryNotificationStore, InMemoryRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} '{id}' does not exist")]
    Missing { entity: &'static str, id: String },
    #[error("{entity} '{id}' already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Reads and writes missions, steps, users and chat messages.
///
/// Implementations must be read-after-write consistent.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>, RepositoryError>;

    async fn get_mission(&self, id: &str) -> Result<Option<Mission>, RepositoryError>;

    async fn get_step(&self, id: &str) -> Result<Option<JudgingStep>, RepositoryError>;

    /// Steps of a mission in ascending `order`
    async fn list_steps_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Vec<JudgingStep>, RepositoryError>;

    async fn insert_mission(&self, mission: Mission) -> Result<Mission, RepositoryError>;

    /// Apply every field set in the patch, assignee included, in one write
    async fn update_mission_details(
        &self,
        id: &str,
        patch: MissionPatch,
    ) -> Result<Mission, RepositoryError>;

    /// Remove a mission together with its steps and chat messages
    async fn delete_mission(&self, id: &str) -> Result<(), RepositoryError>;

    async fn update_mission_status(
        &self,
        id: &str,
        status: MissionStatus,
    ) -> Result<Mission, RepositoryError>;

    /// Set assignee and status together; either both are stored or neither is
    async fn assign_and_set_status(
        &self,
        id: &str,
        assignee_id: UserId,
        status: MissionStatus,
    ) -> Result<Mission, RepositoryError>;

    async fn insert_step(&self, step: JudgingStep) -> Result<JudgingStep, RepositoryError>;

    /// Highest step order of the mission, 0 when it has none
    async fn max_step_order(&self, mission_id: &str) -> Result<u32, RepositoryError>;

    /// Store a step status and, when given, its mission's new status as one unit.
    /// Nothing is written if either record is missing or the write fails.
    async fn apply_step_transition(
        &self,
        step_id: &str,
        status: StepStatus,
        mission_status: Option<MissionStatus>,
    ) -> Result<(JudgingStep, Mission), RepositoryError>;

    async fn update_step_details(
        &self,
        id: &str,
        title: Option<String>,
        judge_id: Option<UserId>,
    ) -> Result<JudgingStep, RepositoryError>;

    async fn insert_chat_message(
        &self,
        message: ChatMessage,
    ) -> Result<ChatMessage, RepositoryError>;
}

/// Persists per-recipient notifications
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError>;

    /// Newest first
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, RepositoryError>;

    async fn count_unread(&self, user_id: UserId) -> Result<usize, RepositoryError>;

    /// Returns false when no notification with that id belongs to the user
    async fn mark_read(&self, id: &str, user_id: UserId) -> Result<bool, RepositoryError>;

    /// Returns how many notifications changed from unread to read
    async fn mark_all_read(&self, user_id: UserId) -> Result<usize, RepositoryError>;
}
