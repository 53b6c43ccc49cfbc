// Domain events and the bus that fans them out to subscribers

pub mod bus;
pub mod types;

pub use bus::{DispatchReport, EventBus, EventBusBuilder, EventSubscriber, FnSubscriber};
pub use types::{
    ChatMessageSent, DomainEvent, EventKind, MissionAssigned, MissionStatusChanged,
    StepStatusChanged,
};
