// Mission Workflow Library - missions, judging steps and their notifications
// This exposes the core components for the CLI, tests and embedding services

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod notification;
pub mod observability;
pub mod store;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use config::{config, init_config, WorkflowConfig};
pub use domain::{
    ChatMessage, JudgingStep, Mission, MissionPatch, MissionStatus, NewMission, Notification,
    NotificationType, Priority, Product, StepStatus, User, UserId, UserRole,
};
pub use error::{Result, WorkflowError};
pub use events::{DomainEvent, EventBus, EventBusBuilder, EventKind, EventSubscriber};
pub use lifecycle::{derive_mission_status, MissionStateMachine, StepStateMachine, TransitionError};
pub use notification::{register_listeners, NotificationService};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics};
pub use store::{
    InMemoryNotificationStore, InMemoryRepository, NotificationStore, Repository,
    RepositoryError,
};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{MissionOverview, WorkflowService};
