// Notifications: the store-facing service and the event listeners feeding it

pub mod listeners;
pub mod service;

use std::sync::Arc;

pub use listeners::{
    ChatNotificationListener, JudgingNotificationListener, MissionNotificationListener,
};
pub use service::NotificationService;

use crate::events::{EventBusBuilder, EventKind};
use crate::store::Repository;

/// Register one listener per event family on the bus being built
pub fn register_listeners(
    builder: EventBusBuilder,
    repository: Arc<dyn Repository>,
    notifications: NotificationService,
) -> EventBusBuilder {
    let chat = Arc::new(ChatNotificationListener::new(
        repository.clone(),
        notifications.clone(),
    ));
    let judging = Arc::new(JudgingNotificationListener::new(
        repository.clone(),
        notifications.clone(),
    ));
    let mission = Arc::new(MissionNotificationListener::new(repository, notifications));

    builder
        .subscribe(EventKind::ChatMessageSent, chat)
        .subscribe(EventKind::StepStatusChanged, judging)
        .subscribe(EventKind::MissionStatusChanged, mission.clone())
        .subscribe(EventKind::MissionAssigned, mission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        JudgingStep, Mission, MissionStatus, NotificationType, Priority, StepStatus, User,
        UserRole,
    };
    use crate::events::{
        ChatMessageSent, DomainEvent, EventBus, MissionAssigned, MissionStatusChanged,
        StepStatusChanged,
    };
    use crate::store::{InMemoryNotificationStore, InMemoryRepository};
    use chrono::Utc;

    const CREATOR: i64 = 1;
    const ASSIGNEE: i64 = 2;
    const JUDGE: i64 = 3;

    struct Fixture {
        bus: EventBus,
        store: Arc<InMemoryNotificationStore>,
    }

    async fn fixture() -> Fixture {
        fixture_with_judge(JUDGE).await
    }

    async fn fixture_with_judge(judge_id: i64) -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        for (id, name, role) in [
            (CREATOR, "Admin", UserRole::Admin),
            (ASSIGNEE, "Sara", UserRole::User),
            (JUDGE, "Reza", UserRole::Judge),
        ] {
            repo.add_user(User {
                id,
                name: name.to_string(),
                role,
            })
            .await;
        }
        repo.insert_mission(Mission {
            id: "m-1".to_string(),
            title: "Launch plan".to_string(),
            description: String::new(),
            status: MissionStatus::InProgress,
            priority: Priority::Normal,
            due_date: Utc::now(),
            assignee_id: Some(ASSIGNEE),
            creator_id: CREATOR,
            product_id: "p-1".to_string(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        repo.insert_step(JudgingStep {
            id: "js-1".to_string(),
            mission_id: "m-1".to_string(),
            title: "Draft".to_string(),
            status: StepStatus::NotDone,
            order: 1,
            judge_id,
        })
        .await
        .unwrap();

        let store = Arc::new(InMemoryNotificationStore::new());
        let notifications = NotificationService::new(store.clone());
        let bus = register_listeners(EventBus::builder(), repo, notifications).build();
        Fixture { bus, store }
    }

    fn step_event(previous: StepStatus, new: StepStatus) -> DomainEvent {
        judged_step_event(previous, new, JUDGE)
    }

    fn judged_step_event(previous: StepStatus, new: StepStatus, judge_id: i64) -> DomainEvent {
        StepStatusChanged {
            step_id: "js-1".to_string(),
            mission_id: "m-1".to_string(),
            previous_status: previous,
            new_status: new,
            judge_id,
        }
        .into()
    }

    fn assigned_event(new_assignee_id: i64, assigned_by_id: i64) -> DomainEvent {
        MissionAssigned {
            mission_id: "m-1".to_string(),
            previous_assignee_id: None,
            new_assignee_id,
            assigned_by_id,
        }
        .into()
    }

    #[tokio::test]
    async fn test_every_event_kind_has_one_listener() {
        let fixture = fixture().await;
        for kind in [
            EventKind::ChatMessageSent,
            EventKind::StepStatusChanged,
            EventKind::MissionStatusChanged,
            EventKind::MissionAssigned,
        ] {
            assert_eq!(fixture.bus.subscriber_count(kind), 1, "{kind}");
        }
    }

    #[tokio::test]
    async fn test_submission_notifies_judge() {
        let fixture = fixture().await;
        fixture
            .bus
            .publish(step_event(StepStatus::NotDone, StepStatus::WaitingJudge))
            .await;

        let all = fixture.store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].recipient_id, JUDGE);
        assert_eq!(all[0].kind, NotificationType::Approval);
        assert_eq!(all[0].sender_id, Some(ASSIGNEE));
        assert_eq!(all[0].step_id.as_deref(), Some("js-1"));
    }

    #[tokio::test]
    async fn test_judge_decisions_notify_assignee() {
        let fixture = fixture().await;
        fixture
            .bus
            .publish(step_event(StepStatus::WaitingJudge, StepStatus::NeedsFix))
            .await;
        fixture
            .bus
            .publish(step_event(StepStatus::WaitingJudge, StepStatus::Approved))
            .await;

        let all = fixture.store.all().await;
        let kinds: Vec<_> = all.iter().map(|n| (n.recipient_id, n.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (ASSIGNEE, NotificationType::Fix),
                (ASSIGNEE, NotificationType::Approval)
            ]
        );
    }

    #[tokio::test]
    async fn test_mission_status_only_notifies_for_fix_and_done() {
        let fixture = fixture().await;
        for new_status in [
            MissionStatus::Judging,
            MissionStatus::NeedsFix,
            MissionStatus::Done,
        ] {
            fixture
                .bus
                .publish(
                    MissionStatusChanged {
                        mission_id: "m-1".to_string(),
                        previous_status: MissionStatus::InProgress,
                        new_status,
                        acting_user_id: JUDGE,
                    }
                    .into(),
                )
                .await;
        }

        let all = fixture.store.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, NotificationType::Fix);
        assert_eq!(all[1].kind, NotificationType::Approval);
        assert!(all.iter().all(|n| n.recipient_id == ASSIGNEE));
    }

    #[tokio::test]
    async fn test_accepting_a_mission_notifies_creator() {
        let fixture = fixture().await;
        fixture
            .bus
            .publish(assigned_event(ASSIGNEE, ASSIGNEE))
            .await;

        let all = fixture.store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].recipient_id, CREATOR);
        assert_eq!(all[0].kind, NotificationType::Assignment);
        assert_eq!(all[0].text, "Mission \"Launch plan\" was accepted by Sara");
    }

    #[tokio::test]
    async fn test_judge_who_is_also_assignee_is_notified() {
        let fixture = fixture_with_judge(ASSIGNEE).await;
        fixture
            .bus
            .publish(judged_step_event(
                StepStatus::NotDone,
                StepStatus::WaitingJudge,
                ASSIGNEE,
            ))
            .await;
        fixture
            .bus
            .publish(judged_step_event(
                StepStatus::WaitingJudge,
                StepStatus::Approved,
                ASSIGNEE,
            ))
            .await;

        let all = fixture.store.all().await;
        let kinds: Vec<_> = all.iter().map(|n| (n.recipient_id, n.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (ASSIGNEE, NotificationType::Approval),
                (ASSIGNEE, NotificationType::Approval)
            ]
        );
        assert_eq!(all[0].sender_id, Some(ASSIGNEE));
    }

    #[tokio::test]
    async fn test_creator_taking_own_mission_is_notified() {
        let fixture = fixture().await;
        fixture.bus.publish(assigned_event(CREATOR, CREATOR)).await;

        let all = fixture.store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].recipient_id, CREATOR);
        assert_eq!(all[0].kind, NotificationType::Assignment);
        assert_eq!(all[0].text, "Mission \"Launch plan\" was accepted by Admin");
    }

    #[tokio::test]
    async fn test_admin_assignment_only_notifies_creator() {
        let fixture = fixture().await;
        fixture.bus.publish(assigned_event(ASSIGNEE, CREATOR)).await;

        let all = fixture.store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].recipient_id, CREATOR);
        assert_eq!(all[0].sender_id, Some(CREATOR));
        assert_eq!(all[0].text, "Mission \"Launch plan\" was assigned to Sara");
    }

    #[tokio::test]
    async fn test_chat_notifies_each_recipient() {
        let fixture = fixture().await;
        fixture
            .bus
            .publish(
                ChatMessageSent {
                    message_id: "c-1".to_string(),
                    mission_id: "m-1".to_string(),
                    sender_id: CREATOR,
                    text: "status?".to_string(),
                    recipient_ids: vec![ASSIGNEE, JUDGE],
                }
                .into(),
            )
            .await;

        let all = fixture.store.all().await;
        let recipients: Vec<_> = all.iter().map(|n| n.recipient_id).collect();
        assert_eq!(recipients, vec![ASSIGNEE, JUDGE]);
        assert!(all.iter().all(|n| n.kind == NotificationType::Chat));
        assert_eq!(all[0].text, "Admin sent a new message");
    }
}
