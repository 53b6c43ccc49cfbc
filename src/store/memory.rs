// In-memory storage used by tests and the replay CLI

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{NotificationStore, Repository, RepositoryError};
use crate::domain::{
    new_notification_id, ChatMessage, JudgingStep, Mission, MissionPatch, MissionStatus,
    NewNotification, Notification, Product, StepStatus, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    products: HashMap<String, Product>,
    missions: HashMap<String, Mission>,
    steps: HashMap<String, JudgingStep>,
    messages: Vec<ChatMessage>,
}

/// Repository backed by hash maps behind a single async lock
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn add_product(&self, product: Product) {
        self.tables
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    pub async fn chat_messages(&self, mission_id: &str) -> Vec<ChatMessage> {
        self.tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.mission_id == mission_id)
            .cloned()
            .collect()
    }
}

fn missing(entity: &'static str, id: &str) -> RepositoryError {
    RepositoryError::Missing {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, RepositoryError> {
        Ok(self.tables.read().await.products.get(id).cloned())
    }

    async fn get_mission(&self, id: &str) -> Result<Option<Mission>, RepositoryError> {
        Ok(self.tables.read().await.missions.get(id).cloned())
    }

    async fn get_step(&self, id: &str) -> Result<Option<JudgingStep>, RepositoryError> {
        Ok(self.tables.read().await.steps.get(id).cloned())
    }

    async fn list_steps_by_mission(
        &self,
        mission_id: &str,
    ) -> Result<Vec<JudgingStep>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut steps: Vec<JudgingStep> = tables
            .steps
            .values()
            .filter(|s| s.mission_id == mission_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.order);
        Ok(steps)
    }

    async fn insert_mission(&self, mission: Mission) -> Result<Mission, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.missions.contains_key(&mission.id) {
            return Err(RepositoryError::Duplicate {
                entity: "mission",
                id: mission.id,
            });
        }
        tables.missions.insert(mission.id.clone(), mission.clone());
        Ok(mission)
    }

    async fn update_mission_details(
        &self,
        id: &str,
        patch: MissionPatch,
    ) -> Result<Mission, RepositoryError> {
        let mut tables = self.tables.write().await;
        let mission = tables
            .missions
            .get_mut(id)
            .ok_or_else(|| missing("mission", id))?;
        if let Some(title) = patch.title {
            mission.title = title;
        }
        if let Some(description) = patch.description {
            mission.description = description;
        }
        if let Some(priority) = patch.priority {
            mission.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            mission.due_date = due_date;
        }
        if let Some(assignee_id) = patch.assignee_id {
            mission.assignee_id = Some(assignee_id);
        }
        Ok(mission.clone())
    }

    async fn delete_mission(&self, id: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.missions.remove(id).is_none() {
            return Err(missing("mission", id));
        }
        tables.steps.retain(|_, step| step.mission_id != id);
        tables.messages.retain(|message| message.mission_id != id);
        Ok(())
    }

    async fn update_mission_status(
        &self,
        id: &str,
        status: MissionStatus,
    ) -> Result<Mission, RepositoryError> {
        let mut tables = self.tables.write().await;
        let mission = tables
            .missions
            .get_mut(id)
            .ok_or_else(|| missing("mission", id))?;
        mission.status = status;
        Ok(mission.clone())
    }

    async fn assign_and_set_status(
        &self,
        id: &str,
        assignee_id: UserId,
        status: MissionStatus,
    ) -> Result<Mission, RepositoryError> {
        let mut tables = self.tables.write().await;
        let mission = tables
            .missions
            .get_mut(id)
            .ok_or_else(|| missing("mission", id))?;
        mission.assignee_id = Some(assignee_id);
        mission.status = status;
        Ok(mission.clone())
    }

    async fn insert_step(&self, step: JudgingStep) -> Result<JudgingStep, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.missions.contains_key(&step.mission_id) {
            return Err(missing("mission", &step.mission_id));
        }
        if tables.steps.contains_key(&step.id) {
            return Err(RepositoryError::Duplicate {
                entity: "judging step",
                id: step.id,
            });
        }
        tables.steps.insert(step.id.clone(), step.clone());
        Ok(step)
    }

    async fn max_step_order(&self, mission_id: &str) -> Result<u32, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .steps
            .values()
            .filter(|s| s.mission_id == mission_id)
            .map(|s| s.order)
            .max()
            .unwrap_or(0))
    }

    async fn apply_step_transition(
        &self,
        step_id: &str,
        status: StepStatus,
        mission_status: Option<MissionStatus>,
    ) -> Result<(JudgingStep, Mission), RepositoryError> {
        let mut tables = self.tables.write().await;
        let mission_id = tables
            .steps
            .get(step_id)
            .map(|step| step.mission_id.clone())
            .ok_or_else(|| missing("judging step", step_id))?;
        if !tables.missions.contains_key(&mission_id) {
            return Err(missing("mission", &mission_id));
        }

        // Both records exist; from here on nothing can fail.
        let step = tables
            .steps
            .get_mut(step_id)
            .ok_or_else(|| missing("judging step", step_id))?;
        step.status = status;
        let step = step.clone();
        let mission = tables
            .missions
            .get_mut(&mission_id)
            .ok_or_else(|| missing("mission", &mission_id))?;
        if let Some(mission_status) = mission_status {
            mission.status = mission_status;
        }
        Ok((step, mission.clone()))
    }

    async fn update_step_details(
        &self,
        id: &str,
        title: Option<String>,
        judge_id: Option<UserId>,
    ) -> Result<JudgingStep, RepositoryError> {
        let mut tables = self.tables.write().await;
        let step = tables
            .steps
            .get_mut(id)
            .ok_or_else(|| missing("judging step", id))?;
        if let Some(title) = title {
            step.title = title;
        }
        if let Some(judge_id) = judge_id {
            step.judge_id = judge_id;
        }
        Ok(step.clone())
    }

    async fn insert_chat_message(
        &self,
        message: ChatMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.missions.contains_key(&message.mission_id) {
            return Err(missing("mission", &message.mission_id));
        }
        tables.messages.push(message.clone());
        Ok(message)
    }
}

/// Notification store keeping records in insertion order
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    records: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification in creation order, regardless of recipient
    pub async fn all(&self) -> Vec<Notification> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let record = Notification {
            id: new_notification_id(),
            kind: notification.kind,
            text: notification.text,
            recipient_id: notification.recipient_id,
            sender_id: notification.sender_id,
            mission_id: notification.mission_id,
            step_id: notification.step_id,
            read: false,
            created_at: Utc::now(),
        };
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Notification>, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|n| n.recipient_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_unread(&self, user_id: UserId) -> Result<usize, RepositoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.read)
            .count())
    }

    async fn mark_read(&self, id: &str, user_id: UserId) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == user_id)
        {
            Some(record) => {
                record.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<usize, RepositoryError> {
        let mut records = self.records.write().await;
        let mut changed = 0;
        for record in records
            .iter_mut()
            .filter(|n| n.recipient_id == user_id && !n.read)
        {
            record.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationType, Priority, UserRole};

    fn mission(id: &str) -> Mission {
        Mission {
            id: id.to_string(),
            title: "Write report".to_string(),
            description: String::new(),
            status: MissionStatus::Pending,
            priority: Priority::Normal,
            due_date: Utc::now(),
            assignee_id: None,
            creator_id: 1,
            product_id: "p-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn step(id: &str, mission_id: &str, order: u32) -> JudgingStep {
        JudgingStep {
            id: id.to_string(),
            mission_id: mission_id.to_string(),
            title: format!("Step {order}"),
            status: StepStatus::NotDone,
            order,
            judge_id: 2,
        }
    }

    #[tokio::test]
    async fn test_steps_are_listed_in_order() {
        let repo = InMemoryRepository::new();
        repo.insert_mission(mission("m-1")).await.unwrap();
        repo.insert_step(step("js-b", "m-1", 2)).await.unwrap();
        repo.insert_step(step("js-a", "m-1", 1)).await.unwrap();

        let steps = repo.list_steps_by_mission("m-1").await.unwrap();
        let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["js-a", "js-b"]);
        assert_eq!(repo.max_step_order("m-1").await.unwrap(), 2);
        assert_eq!(repo.max_step_order("m-unknown").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_mission_cascades() {
        let repo = InMemoryRepository::new();
        repo.add_user(User {
            id: 1,
            name: "Sara".to_string(),
            role: UserRole::User,
        })
        .await;
        repo.insert_mission(mission("m-1")).await.unwrap();
        repo.insert_step(step("js-a", "m-1", 1)).await.unwrap();
        repo.insert_chat_message(ChatMessage {
            id: "c-1".to_string(),
            mission_id: "m-1".to_string(),
            step_id: None,
            sender_id: 1,
            text: "hello".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        repo.delete_mission("m-1").await.unwrap();

        assert!(repo.get_mission("m-1").await.unwrap().is_none());
        assert!(repo.get_step("js-a").await.unwrap().is_none());
        assert!(repo.chat_messages("m-1").await.is_empty());
        assert!(matches!(
            repo.delete_mission("m-1").await,
            Err(RepositoryError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_step_requires_existing_mission() {
        let repo = InMemoryRepository::new();
        let result = repo.insert_step(step("js-a", "m-missing", 1)).await;
        assert!(matches!(result, Err(RepositoryError::Missing { entity: "mission", .. })));
    }

    #[tokio::test]
    async fn test_step_transition_writes_step_and_mission_together() {
        let repo = InMemoryRepository::new();
        repo.insert_mission(mission("m-1")).await.unwrap();
        repo.insert_step(step("js-a", "m-1", 1)).await.unwrap();

        let (step, mission) = repo
            .apply_step_transition("js-a", StepStatus::WaitingJudge, Some(MissionStatus::Judging))
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::WaitingJudge);
        assert_eq!(mission.status, MissionStatus::Judging);

        let (_, mission) = repo
            .apply_step_transition("js-a", StepStatus::NeedsFix, None)
            .await
            .unwrap();
        assert_eq!(mission.status, MissionStatus::Judging, "untouched without a target");
    }

    #[tokio::test]
    async fn test_step_transition_with_missing_mission_changes_nothing() {
        let repo = InMemoryRepository::new();
        repo.insert_mission(mission("m-1")).await.unwrap();
        repo.insert_step(step("js-a", "m-1", 1)).await.unwrap();
        // Orphan the step by removing its mission from under it
        repo.tables.write().await.missions.remove("m-1");

        let result = repo
            .apply_step_transition("js-a", StepStatus::WaitingJudge, Some(MissionStatus::Judging))
            .await;

        assert!(matches!(result, Err(RepositoryError::Missing { entity: "mission", .. })));
        let stored = repo.get_step("js-a").await.unwrap().unwrap();
        assert_eq!(stored.status, StepStatus::NotDone);
    }

    #[tokio::test]
    async fn test_assign_and_set_status_and_patch_assignee() {
        let repo = InMemoryRepository::new();
        repo.insert_mission(mission("m-1")).await.unwrap();

        let taken = repo
            .assign_and_set_status("m-1", 7, MissionStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(taken.assignee_id, Some(7));
        assert_eq!(taken.status, MissionStatus::InProgress);

        let patched = repo
            .update_mission_details(
                "m-1",
                MissionPatch {
                    title: Some("Rewrite report".to_string()),
                    assignee_id: Some(8),
                    ..MissionPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.title, "Rewrite report");
        assert_eq!(patched.assignee_id, Some(8));

        assert!(matches!(
            repo.assign_and_set_status("m-missing", 7, MissionStatus::InProgress)
                .await,
            Err(RepositoryError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn test_notifications_mark_read_per_recipient() {
        let store = InMemoryNotificationStore::new();
        let mut ids = Vec::new();
        for recipient in [1, 1, 2] {
            let created = store
                .create_notification(NewNotification {
                    kind: NotificationType::Chat,
                    text: "new message".to_string(),
                    recipient_id: recipient,
                    sender_id: Some(3),
                    mission_id: Some("m-1".to_string()),
                    step_id: None,
                })
                .await
                .unwrap();
            ids.push(created.id);
        }

        assert_eq!(store.count_unread(1).await.unwrap(), 2);
        // someone else's notification cannot be marked
        assert!(!store.mark_read(&ids[2], 1).await.unwrap());
        assert!(store.mark_read(&ids[0], 1).await.unwrap());
        assert_eq!(store.count_unread(1).await.unwrap(), 1);
        assert_eq!(store.mark_all_read(1).await.unwrap(), 1);
        assert_eq!(store.count_unread(1).await.unwrap(), 0);
        assert_eq!(store.count_unread(2).await.unwrap(), 1);

        let listed = store.list_for_user(1).await.unwrap();
        assert_eq!(listed[0].id, ids[1], "newest first");
    }
}
