//! Scenario replay against in-memory storage.
//!
//! A scenario lists users, products and an ordered list of actions. Missions and steps
//! created by the scenario are referred to by a scenario-local `ref`; a reference that was
//! never defined is used as a literal id. A failing action is reported and the replay
//! moves on to the next one.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::Command;
use crate::config::WorkflowConfig;
use crate::domain::{
    MissionPatch, MissionStatus, NewMission, Notification, Priority, Product, StepStatus, User,
    UserId,
};
use crate::error::WorkflowError;
use crate::events::EventBus;
use crate::notification::{register_listeners, NotificationService};
use crate::observability::OperationTimer;
use crate::store::{InMemoryNotificationStore, InMemoryRepository};
use crate::workflow::WorkflowService;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateMission {
        #[serde(rename = "as")]
        user: UserId,
        #[serde(rename = "ref")]
        reference: Option<String>,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        priority: Priority,
        #[serde(default = "default_due_in_days")]
        due_in_days: i64,
        #[serde(default)]
        assignee_id: Option<UserId>,
        product_id: String,
    },
    UpdateMission {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
        #[serde(flatten)]
        patch: MissionPatch,
    },
    AssignMission {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
        assignee_id: UserId,
    },
    DeleteMission {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
    },
    TakeMission {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
    },
    SetMissionStatus {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
        status: MissionStatus,
    },
    CreateStep {
        #[serde(rename = "as")]
        user: UserId,
        #[serde(rename = "ref")]
        reference: Option<String>,
        mission: String,
        title: String,
        judge_id: UserId,
    },
    AdvanceStep {
        #[serde(rename = "as")]
        user: UserId,
        step: String,
        status: StepStatus,
    },
    SendChat {
        #[serde(rename = "as")]
        user: UserId,
        mission: String,
        #[serde(default)]
        step: Option<String>,
        text: String,
    },
    MarkAllRead {
        #[serde(rename = "as")]
        user: UserId,
    },
}

fn default_due_in_days() -> i64 {
    7
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateMission { .. } => "create_mission",
            Action::UpdateMission { .. } => "update_mission",
            Action::AssignMission { .. } => "assign_mission",
            Action::DeleteMission { .. } => "delete_mission",
            Action::TakeMission { .. } => "take_mission",
            Action::SetMissionStatus { .. } => "set_mission_status",
            Action::CreateStep { .. } => "create_step",
            Action::AdvanceStep { .. } => "advance_step",
            Action::SendChat { .. } => "send_chat",
            Action::MarkAllRead { .. } => "mark_all_read",
        }
    }
}

/// What a replay produced: one line per action and the notifications left in the store
#[derive(Debug)]
pub struct ReplayReport {
    pub outcomes: Vec<String>,
    pub failures: usize,
    pub notifications: Vec<Notification>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }
}

struct Replayer {
    service: WorkflowService,
    notifications: NotificationService,
    refs: HashMap<String, String>,
}

impl Replayer {
    fn resolve(&self, reference: &str) -> String {
        self.refs
            .get(reference)
            .cloned()
            .unwrap_or_else(|| reference.to_string())
    }

    fn remember(&mut self, reference: Option<String>, id: &str) {
        if let Some(reference) = reference {
            self.refs.insert(reference, id.to_string());
        }
    }

    async fn apply(&mut self, action: Action) -> Result<String, WorkflowError> {
        match action {
            Action::CreateMission {
                user,
                reference,
                title,
                description,
                priority,
                due_in_days,
                assignee_id,
                product_id,
            } => {
                let due_date = Duration::try_days(due_in_days)
                    .and_then(|offset| Utc::now().checked_add_signed(offset))
                    .ok_or_else(|| {
                        WorkflowError::InvalidInput(format!(
                            "due_in_days {due_in_days} is outside the supported date range"
                        ))
                    })?;
                let input = NewMission {
                    title,
                    description,
                    priority,
                    due_date,
                    assignee_id,
                    product_id,
                };
                let mission = self.service.create_mission(input, user).await?;
                self.remember(reference, &mission.id);
                Ok(format!("mission {} {}", mission.id, mission.status))
            }
            Action::UpdateMission {
                user,
                mission,
                patch,
            } => {
                let mission = self
                    .service
                    .update_mission(&self.resolve(&mission), patch, user)
                    .await?;
                Ok(format!("mission {} \"{}\"", mission.id, mission.title))
            }
            Action::AssignMission {
                user,
                mission,
                assignee_id,
            } => {
                let mission = self
                    .service
                    .assign_mission(&self.resolve(&mission), assignee_id, user)
                    .await?;
                Ok(format!("mission {} assignee {assignee_id}", mission.id))
            }
            Action::DeleteMission { user, mission } => {
                let id = self.resolve(&mission);
                self.service.delete_mission(&id, user).await?;
                Ok(format!("mission {id} deleted"))
            }
            Action::TakeMission { user, mission } => {
                let mission = self
                    .service
                    .take_mission(&self.resolve(&mission), user)
                    .await?;
                Ok(format!("mission {} {}", mission.id, mission.status))
            }
            Action::SetMissionStatus {
                user,
                mission,
                status,
            } => {
                let mission = self
                    .service
                    .update_mission_status(&self.resolve(&mission), status, user)
                    .await?;
                Ok(format!("mission {} {}", mission.id, mission.status))
            }
            Action::CreateStep {
                user,
                reference,
                mission,
                title,
                judge_id,
            } => {
                let step = self
                    .service
                    .create_step(&self.resolve(&mission), &title, judge_id, user)
                    .await?;
                self.remember(reference, &step.id);
                Ok(format!("step {} #{} {}", step.id, step.order, step.status))
            }
            Action::AdvanceStep { user, step, status } => {
                let step = self
                    .service
                    .advance_step(&self.resolve(&step), status, user)
                    .await?;
                let overview = self.service.mission_overview(&step.mission_id).await?;
                Ok(format!(
                    "step {} {} (mission {})",
                    step.id, step.status, overview.mission.status
                ))
            }
            Action::SendChat {
                user,
                mission,
                step,
                text,
            } => {
                let step = step.map(|s| self.resolve(&s));
                let message = self
                    .service
                    .send_chat_message(&self.resolve(&mission), step.as_deref(), user, &text)
                    .await?;
                Ok(format!("message {}", message.id))
            }
            Action::MarkAllRead { user } => {
                let changed = self.notifications.mark_all_read(user).await?;
                Ok(format!("{changed} notifications marked read"))
            }
        }
    }
}

/// Replay a scenario against fresh in-memory stores with the notification listeners wired
pub async fn run_scenario(scenario: Scenario, config: &WorkflowConfig) -> Result<ReplayReport> {
    let timer = OperationTimer::new("replay");
    let repository = Arc::new(InMemoryRepository::new());
    for user in scenario.users {
        repository.add_user(user).await;
    }
    for product in scenario.products {
        repository.add_product(product).await;
    }

    let store = Arc::new(InMemoryNotificationStore::new());
    let notifications = NotificationService::new(store.clone());
    let bus = register_listeners(
        EventBus::builder().tap_capacity(config.events.tap_capacity),
        repository.clone(),
        notifications.clone(),
    )
    .build();
    let service = WorkflowService::new(repository, Arc::new(bus)).with_config(config);

    let mut replayer = Replayer {
        service,
        notifications,
        refs: HashMap::new(),
    };
    let mut outcomes = Vec::with_capacity(scenario.actions.len());
    let mut failures = 0;

    for (index, action) in scenario.actions.into_iter().enumerate() {
        let name = action.name();
        let line = match replayer.apply(action).await {
            Ok(summary) => format!("#{} {name} ok: {summary}", index + 1),
            Err(err) => {
                failures += 1;
                format!("#{} {name} error {}: {err}", index + 1, err.code())
            }
        };
        outcomes.push(line);
    }

    info!(
        actions = outcomes.len(),
        failures = failures,
        "Scenario replayed"
    );
    timer.finish();
    Ok(ReplayReport {
        outcomes,
        failures,
        notifications: store.all().await,
    })
}

pub struct ReplayCommand {
    pub file: PathBuf,
    pub config: WorkflowConfig,
}

impl ReplayCommand {
    pub fn new(file: PathBuf, config: WorkflowConfig) -> Self {
        Self { file, config }
    }
}

impl Command for ReplayCommand {
    async fn execute(&self) -> Result<()> {
        let scenario = Scenario::from_file(&self.file)?;
        let report = run_scenario(scenario, &self.config).await?;

        for line in &report.outcomes {
            println!("{line}");
        }
        for notification in &report.notifications {
            println!("{}", serde_json::to_string(notification)?);
        }
        Ok(())
    }
}
