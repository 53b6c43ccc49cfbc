use std::sync::Arc;
use tracing::debug;

use crate::domain::{NewNotification, Notification, UserId};
use crate::error::{Result, WorkflowError};
use crate::observability::workflow_metrics;
use crate::store::NotificationStore;

/// Creates and reads per-recipient notifications
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn notify(&self, notification: NewNotification) -> Result<Notification> {
        let created = self.store.create_notification(notification).await?;
        workflow_metrics().record_notification();
        debug!(
            notification.id = %created.id,
            notification.kind = %created.kind,
            user.id = created.recipient_id,
            "Notification created"
        );
        Ok(created)
    }

    pub async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<usize> {
        Ok(self.store.count_unread(user_id).await?)
    }

    pub async fn mark_read(&self, id: &str, user_id: UserId) -> Result<()> {
        if !self.store.mark_read(id, user_id).await? {
            return Err(WorkflowError::not_found("notification", id));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<usize> {
        Ok(self.store.mark_all_read(user_id).await?)
    }
}
