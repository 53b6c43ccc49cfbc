// Domain model shared by the lifecycle machines, the workflow service and the listeners

pub mod types;

pub use types::{
    generate_id, new_message_id, new_mission_id, new_notification_id, new_step_id, ChatMessage,
    JudgingStep, MessageId, Mission, MissionId, MissionPatch, MissionStatus, NewMission,
    NewNotification, Notification, NotificationId, NotificationType, ParseStatusError, Priority,
    Product, ProductId, StepId, StepStatus, User, UserId, UserRole,
};
