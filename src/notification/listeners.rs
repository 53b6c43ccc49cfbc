// Event listeners that turn domain events into notifications
//
// Each listener resolves its own recipients through the repository and trusts the
// event payload. Recipients are notified even when they caused the event themselves.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::service::NotificationService;
use crate::domain::{
    MissionStatus, NewNotification, NotificationType, StepStatus, UserId,
};
use crate::events::{
    ChatMessageSent, DomainEvent, EventSubscriber, MissionAssigned, MissionStatusChanged,
    StepStatusChanged,
};
use crate::store::Repository;

pub struct ChatNotificationListener {
    repository: Arc<dyn Repository>,
    notifications: NotificationService,
}

impl ChatNotificationListener {
    pub fn new(repository: Arc<dyn Repository>, notifications: NotificationService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    async fn on_message_sent(&self, event: &ChatMessageSent) -> Result<()> {
        let sender_name = self
            .repository
            .get_user(event.sender_id)
            .await?
            .map(|user| user.name)
            .unwrap_or_else(|| "Someone".to_string());

        for &recipient_id in &event.recipient_ids {
            self.notifications
                .notify(NewNotification {
                    kind: NotificationType::Chat,
                    text: format!("{sender_name} sent a new message"),
                    recipient_id,
                    sender_id: Some(event.sender_id),
                    mission_id: Some(event.mission_id.clone()),
                    step_id: None,
                })
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for ChatNotificationListener {
    fn name(&self) -> &str {
        "chat-notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::ChatMessageSent(sent) => self.on_message_sent(sent).await,
            _ => Ok(()),
        }
    }
}

pub struct JudgingNotificationListener {
    repository: Arc<dyn Repository>,
    notifications: NotificationService,
}

impl JudgingNotificationListener {
    pub fn new(repository: Arc<dyn Repository>, notifications: NotificationService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    async fn on_step_changed(&self, event: &StepStatusChanged) -> Result<()> {
        let Some(mission) = self.repository.get_mission(&event.mission_id).await? else {
            return Ok(());
        };
        let Some(step) = self.repository.get_step(&event.step_id).await? else {
            return Ok(());
        };

        let notification = match event.new_status {
            StepStatus::WaitingJudge => NewNotification {
                kind: NotificationType::Approval,
                text: format!("Step \"{}\" was submitted for judging", step.title),
                recipient_id: step.judge_id,
                sender_id: mission.assignee_id,
                mission_id: Some(mission.id.clone()),
                step_id: Some(step.id.clone()),
            },
            StepStatus::Approved | StepStatus::NeedsFix => {
                let Some(assignee_id) = mission.assignee_id else {
                    return Ok(());
                };
                let (kind, text) = if event.new_status == StepStatus::Approved {
                    (
                        NotificationType::Approval,
                        format!("The judge approved step \"{}\"", step.title),
                    )
                } else {
                    (
                        NotificationType::Fix,
                        format!("The judge asked for a fix on step \"{}\"", step.title),
                    )
                };
                NewNotification {
                    kind,
                    text,
                    recipient_id: assignee_id,
                    sender_id: Some(event.judge_id),
                    mission_id: Some(mission.id.clone()),
                    step_id: Some(step.id.clone()),
                }
            }
            StepStatus::NotDone => return Ok(()),
        };

        debug!(
            step.id = %event.step_id,
            user.id = notification.recipient_id,
            "Notifying about judging step"
        );
        self.notifications.notify(notification).await?;
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for JudgingNotificationListener {
    fn name(&self) -> &str {
        "judging-notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::StepStatusChanged(changed) => self.on_step_changed(changed).await,
            _ => Ok(()),
        }
    }
}

pub struct MissionNotificationListener {
    repository: Arc<dyn Repository>,
    notifications: NotificationService,
}

impl MissionNotificationListener {
    pub fn new(repository: Arc<dyn Repository>, notifications: NotificationService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    async fn on_status_changed(&self, event: &MissionStatusChanged) -> Result<()> {
        let (kind, verb) = match event.new_status {
            MissionStatus::NeedsFix => (NotificationType::Fix, "needs a fix"),
            MissionStatus::Done => (NotificationType::Approval, "was approved"),
            _ => return Ok(()),
        };
        let Some(mission) = self.repository.get_mission(&event.mission_id).await? else {
            return Ok(());
        };
        let Some(assignee_id) = mission.assignee_id else {
            return Ok(());
        };

        self.notifications
            .notify(NewNotification {
                kind,
                text: format!("Mission \"{}\" {verb}", mission.title),
                recipient_id: assignee_id,
                sender_id: Some(event.acting_user_id),
                mission_id: Some(mission.id),
                step_id: None,
            })
            .await?;
        Ok(())
    }

    async fn on_assigned(&self, event: &MissionAssigned) -> Result<()> {
        let Some(mission) = self.repository.get_mission(&event.mission_id).await? else {
            return Ok(());
        };
        let assignee_name = self.user_name(event.new_assignee_id).await?;
        let accepted = event.assigned_by_id == event.new_assignee_id;

        let creator_text = if accepted {
            format!("Mission \"{}\" was accepted by {assignee_name}", mission.title)
        } else {
            format!("Mission \"{}\" was assigned to {assignee_name}", mission.title)
        };
        self.notifications
            .notify(NewNotification {
                kind: NotificationType::Assignment,
                text: creator_text,
                recipient_id: mission.creator_id,
                sender_id: Some(event.assigned_by_id),
                mission_id: Some(mission.id),
                step_id: None,
            })
            .await?;
        Ok(())
    }

    async fn user_name(&self, user_id: UserId) -> Result<String> {
        Ok(self
            .repository
            .get_user(user_id)
            .await?
            .map(|user| user.name)
            .unwrap_or_else(|| format!("user {user_id}")))
    }
}

#[async_trait]
impl EventSubscriber for MissionNotificationListener {
    fn name(&self) -> &str {
        "mission-notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::MissionStatusChanged(changed) => self.on_status_changed(changed).await,
            DomainEvent::MissionAssigned(assigned) => self.on_assigned(assigned).await,
            _ => Ok(()),
        }
    }
}
