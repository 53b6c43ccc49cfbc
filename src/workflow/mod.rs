// Mission workflow: the operations that move missions and judging steps

pub mod locks;
pub mod service;


pub use locks::{MissionGuard, MissionLocks};
pub use service::{chat_recipients, is_locked, MissionOverview, WorkflowService};
