//! Workflow orchestration.
//!
//! Every mutating operation follows the same order: load, authorize, validate, write,
//! publish. Nothing is written before every check has passed, and events are published
//! while the mission lock is still held so their order matches the order of the writes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn, Instrument};

use super::locks::MissionLocks;
use crate::config::{LimitsConfig, WorkflowConfig, WorkflowSettings};
use crate::domain::{
    new_message_id, new_mission_id, new_step_id, ChatMessage, JudgingStep, Mission,
    MissionPatch, MissionStatus, NewMission, StepStatus, User, UserId,
};
use crate::error::{Result, WorkflowError};
use crate::events::{
    ChatMessageSent, DomainEvent, EventBus, MissionAssigned, MissionStatusChanged,
    StepStatusChanged,
};
use crate::lifecycle::{derive_mission_status, MissionStateMachine, StepStateMachine, TransitionError};
use crate::observability::workflow_metrics;
use crate::store::{Repository, RepositoryError};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

/// Inserts tried with freshly generated ids before a collision is reported
const ID_ATTEMPTS: usize = 3;

/// A mission together with its steps in ascending order
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MissionOverview {
    pub mission: Mission,
    pub steps: Vec<JudgingStep>,
}

impl MissionOverview {
    pub fn is_step_locked(&self, step_id: &str) -> bool {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .is_some_and(|step| is_locked(&self.steps, step.order))
    }
}

/// A step is locked for judging until every step before it is approved
pub fn is_locked(steps: &[JudgingStep], order: u32) -> bool {
    steps
        .iter()
        .any(|s| s.order < order && s.status != StepStatus::Approved)
}

/// Chat recipients: the assignee and the relevant judges, without the sender and without
/// duplicates, assignee first.
pub fn chat_recipients(
    assignee_id: Option<UserId>,
    judge_ids: impl IntoIterator<Item = UserId>,
    sender_id: UserId,
) -> Vec<UserId> {
    let mut recipients = Vec::new();
    for id in assignee_id.into_iter().chain(judge_ids) {
        if id != sender_id && !recipients.contains(&id) {
            recipients.push(id);
        }
    }
    recipients
}

pub struct WorkflowService {
    repository: Arc<dyn Repository>,
    bus: Arc<EventBus>,
    locks: MissionLocks,
    settings: WorkflowSettings,
    limits: LimitsConfig,
    step_machine: StepStateMachine,
    mission_machine: MissionStateMachine,
}

impl WorkflowService {
    pub fn new(repository: Arc<dyn Repository>, bus: Arc<EventBus>) -> Self {
        Self {
            repository,
            bus,
            locks: MissionLocks::new(),
            settings: WorkflowSettings::default(),
            limits: LimitsConfig::default(),
            step_machine: StepStateMachine,
            mission_machine: MissionStateMachine,
        }
    }

    pub fn with_config(mut self, config: &WorkflowConfig) -> Self {
        self.settings = config.workflow.clone();
        self.limits = config.limits.clone();
        self
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Missions currently locked or waited for by an operation
    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }

    pub async fn mission_overview(&self, mission_id: &str) -> Result<MissionOverview> {
        let mission = self.load_mission(mission_id).await?;
        let steps = self.repository.list_steps_by_mission(mission_id).await?;
        Ok(MissionOverview { mission, steps })
    }

    // ---- missions -------------------------------------------------------------

    pub async fn create_mission(&self, input: NewMission, creator_id: UserId) -> Result<Mission> {
        let span = self.span("create_mission", None, creator_id);
        async move {
            self.validate_title(&input.title)?;
            self.validate_description(&input.description)?;
            if input.due_date <= Utc::now() {
                return Err(WorkflowError::InvalidInput(
                    "due date must be in the future".to_string(),
                ));
            }

            let creator = self.load_user(creator_id).await?;
            if creator.role.is_observer() {
                return Err(WorkflowError::forbidden(
                    "create mission",
                    "observers are read-only",
                ));
            }
            if self.repository.get_product(&input.product_id).await?.is_none() {
                return Err(WorkflowError::not_found("product", &input.product_id));
            }
            if let Some(assignee_id) = input.assignee_id {
                self.ensure_assignable(assignee_id).await?;
            }

            let draft = Mission {
                id: String::new(),
                title: input.title.trim().to_string(),
                description: input.description.trim().to_string(),
                status: MissionStatus::Pending,
                priority: input.priority,
                due_date: input.due_date,
                assignee_id: input.assignee_id,
                creator_id,
                product_id: input.product_id,
                created_at: Utc::now(),
            };
            let mut attempt = 0;
            let mission = loop {
                attempt += 1;
                let candidate = Mission {
                    id: new_mission_id(),
                    ..draft.clone()
                };
                match self.repository.insert_mission(candidate).await {
                    Err(RepositoryError::Duplicate { id, .. }) if attempt < ID_ATTEMPTS => {
                        warn!(mission.id = %id, attempt, "Generated mission id is taken, retrying");
                    }
                    result => break result?,
                }
            };
            info!(mission.id = %mission.id, "Mission created");

            if let Some(assignee_id) = mission.assignee_id {
                self.publish(MissionAssigned {
                    mission_id: mission.id.clone(),
                    previous_assignee_id: None,
                    new_assignee_id: assignee_id,
                    assigned_by_id: creator_id,
                })
                .await;
            }
            Ok(mission)
        }
        .instrument(span)
        .await
    }

    /// Edit mission fields. Admin only; a changed assignee publishes `MissionAssigned`.
    pub async fn update_mission(
        &self,
        mission_id: &str,
        patch: MissionPatch,
        user_id: UserId,
    ) -> Result<Mission> {
        let span = self.span("update_mission", Some(mission_id), user_id);
        self.update_mission_inner(mission_id, patch, user_id)
            .instrument(span)
            .await
    }

    pub async fn assign_mission(
        &self,
        mission_id: &str,
        assignee_id: UserId,
        user_id: UserId,
    ) -> Result<Mission> {
        let span = self.span("assign_mission", Some(mission_id), user_id);
        let patch = MissionPatch {
            assignee_id: Some(assignee_id),
            ..Default::default()
        };
        self.update_mission_inner(mission_id, patch, user_id)
            .instrument(span)
            .await
    }

    async fn update_mission_inner(
        &self,
        mission_id: &str,
        patch: MissionPatch,
        user_id: UserId,
    ) -> Result<Mission> {
        self.ensure_admin(user_id, "update mission").await?;
        let _guard = self.locks.acquire(mission_id).await;
        let mission = self.load_mission(mission_id).await?;

        if let Some(title) = &patch.title {
            self.validate_title(title)?;
        }
        if let Some(description) = &patch.description {
            self.validate_description(description)?;
        }
        if patch.due_date.is_some_and(|due| due <= Utc::now()) {
            return Err(WorkflowError::InvalidInput(
                "due date must be in the future".to_string(),
            ));
        }
        let new_assignee = patch
            .assignee_id
            .filter(|assignee| mission.assignee_id != Some(*assignee));
        if let Some(assignee_id) = new_assignee {
            self.ensure_assignable(assignee_id).await?;
        }

        let details = MissionPatch {
            title: patch.title.map(|t| t.trim().to_string()),
            description: patch.description.map(|d| d.trim().to_string()),
            assignee_id: new_assignee,
            ..patch
        };
        if details.is_empty() {
            return Ok(mission);
        }
        // One write for every field, so a failure cannot leave half an edit behind
        let updated = self
            .repository
            .update_mission_details(mission_id, details)
            .await?;
        if let Some(assignee_id) = new_assignee {
            info!(
                mission.id = %mission_id,
                assignee.id = assignee_id,
                "Mission reassigned"
            );
            self.publish(MissionAssigned {
                mission_id: mission_id.to_string(),
                previous_assignee_id: mission.assignee_id,
                new_assignee_id: assignee_id,
                assigned_by_id: user_id,
            })
            .await;
        }
        Ok(updated)
    }

    /// Remove a mission with its steps and chat. Admin only; publishes nothing.
    pub async fn delete_mission(&self, mission_id: &str, user_id: UserId) -> Result<()> {
        let span = self.span("delete_mission", Some(mission_id), user_id);
        async move {
            self.ensure_admin(user_id, "delete mission").await?;
            let _guard = self.locks.acquire(mission_id).await;
            self.load_mission(mission_id).await?;
            self.repository.delete_mission(mission_id).await?;
            info!(mission.id = %mission_id, "Mission deleted");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Claim a PENDING mission: the user becomes the assignee and work starts.
    pub async fn take_mission(&self, mission_id: &str, user_id: UserId) -> Result<Mission> {
        let span = self.span("take_mission", Some(mission_id), user_id);
        async move {
            let _guard = self.locks.acquire(mission_id).await;
            let mission = self.load_mission(mission_id).await?;
            let user = self.load_user(user_id).await?;
            if user.role.is_observer() {
                return Err(WorkflowError::forbidden(
                    format!("take mission '{mission_id}'"),
                    "observers cannot take missions",
                ));
            }
            if mission.status != MissionStatus::Pending {
                workflow_metrics().record_rejection();
                return Err(WorkflowError::InvalidState(format!(
                    "mission '{mission_id}' is {} and can no longer be taken; only PENDING missions can be taken",
                    mission.status
                )));
            }
            self.check(
                self.mission_machine
                    .validate_transition(mission.status, MissionStatus::InProgress),
            )?;

            let updated = self
                .repository
                .assign_and_set_status(mission_id, user_id, MissionStatus::InProgress)
                .await?;
            workflow_metrics().record_transition();
            info!(mission.id = %mission_id, user.id = user_id, "Mission taken");

            self.publish(MissionAssigned {
                mission_id: mission_id.to_string(),
                previous_assignee_id: mission.assignee_id,
                new_assignee_id: user_id,
                assigned_by_id: user_id,
            })
            .await;
            self.publish(MissionStatusChanged {
                mission_id: mission_id.to_string(),
                previous_status: mission.status,
                new_status: MissionStatus::InProgress,
                acting_user_id: user_id,
            })
            .await;
            Ok(updated)
        }
        .instrument(span)
        .await
    }

    /// Manual status change for missions without judging steps. Missions with steps get
    /// their status from the steps, and PENDING is only left through `take_mission`.
    pub async fn update_mission_status(
        &self,
        mission_id: &str,
        target: MissionStatus,
        user_id: UserId,
    ) -> Result<Mission> {
        let span = self.span("update_mission_status", Some(mission_id), user_id);
        async move {
            let _guard = self.locks.acquire(mission_id).await;
            let mission = self.load_mission(mission_id).await?;
            let user = self.load_user(user_id).await?;
            if user.role.is_observer() {
                return Err(WorkflowError::forbidden(
                    format!("move mission '{mission_id}' from {} to {target}", mission.status),
                    "observers are read-only",
                ));
            }
            if mission.status == MissionStatus::Pending {
                return Err(WorkflowError::InvalidState(format!(
                    "cannot move mission '{mission_id}' from PENDING to {target}; a pending mission must be taken first"
                )));
            }
            let steps = self.repository.list_steps_by_mission(mission_id).await?;
            if !steps.is_empty() {
                return Err(WorkflowError::InvalidState(format!(
                    "cannot move mission '{mission_id}' from {} to {target}; its status is derived from {} judging steps",
                    mission.status,
                    steps.len()
                )));
            }
            self.check(self.mission_machine.validate_transition(mission.status, target))?;

            let updated = self
                .repository
                .update_mission_status(mission_id, target)
                .await?;
            workflow_metrics().record_transition();

            self.publish(MissionStatusChanged {
                mission_id: mission_id.to_string(),
                previous_status: mission.status,
                new_status: target,
                acting_user_id: user_id,
            })
            .await;
            Ok(updated)
        }
        .instrument(span)
        .await
    }

    // ---- judging steps --------------------------------------------------------

    /// Append a judging step; it gets the next order number and starts NOT_DONE.
    pub async fn create_step(
        &self,
        mission_id: &str,
        title: &str,
        judge_id: UserId,
        user_id: UserId,
    ) -> Result<JudgingStep> {
        let span = self.span("create_step", Some(mission_id), user_id);
        async move {
            self.validate_title(title)?;
            self.ensure_not_observer(user_id, "create judging step").await?;

            let _guard = self.locks.acquire(mission_id).await;
            let mission = self.load_mission(mission_id).await?;
            self.ensure_can_judge(judge_id).await?;
            if mission.status == MissionStatus::Done {
                return Err(WorkflowError::InvalidState(format!(
                    "mission '{mission_id}' is DONE; steps cannot be added"
                )));
            }

            let order = self.repository.max_step_order(mission_id).await? + 1;
            let mut attempt = 0;
            let step = loop {
                attempt += 1;
                let candidate = JudgingStep {
                    id: new_step_id(),
                    mission_id: mission_id.to_string(),
                    title: title.trim().to_string(),
                    status: StepStatus::NotDone,
                    order,
                    judge_id,
                };
                match self.repository.insert_step(candidate).await {
                    Err(RepositoryError::Duplicate { id, .. }) if attempt < ID_ATTEMPTS => {
                        warn!(step.id = %id, attempt, "Generated step id is taken, retrying");
                    }
                    result => break result?,
                }
            };
            info!(step.id = %step.id, step.order = order, "Judging step created");
            Ok(step)
        }
        .instrument(span)
        .await
    }

    pub async fn update_step(
        &self,
        step_id: &str,
        title: Option<String>,
        judge_id: Option<UserId>,
        user_id: UserId,
    ) -> Result<JudgingStep> {
        let span = self.span("update_step", None, user_id);
        async move {
            if let Some(title) = &title {
                self.validate_title(title)?;
            }
            self.ensure_not_observer(user_id, "update judging step").await?;
            let mission_id = self.load_step(step_id).await?.mission_id;

            let _guard = self.locks.acquire(&mission_id).await;
            self.load_step(step_id).await?;
            if let Some(judge_id) = judge_id {
                self.ensure_can_judge(judge_id).await?;
            }
            Ok(self
                .repository
                .update_step_details(step_id, title.map(|t| t.trim().to_string()), judge_id)
                .await?)
        }
        .instrument(span)
        .await
    }

    /// Move a judging step and re-derive its mission's status.
    ///
    /// Submitting for judgement (WAITING_JUDGE) is reserved for the mission assignee; every
    /// other target is reserved for the step's judge. The derived mission status is
    /// written without consulting the mission state machine.
    pub async fn advance_step(
        &self,
        step_id: &str,
        target: StepStatus,
        user_id: UserId,
    ) -> Result<JudgingStep> {
        let span = self.span("advance_step", None, user_id);
        self.advance_step_inner(step_id, target, user_id)
            .instrument(span)
            .await
    }

    async fn advance_step_inner(
        &self,
        step_id: &str,
        target: StepStatus,
        user_id: UserId,
    ) -> Result<JudgingStep> {
        let mission_id = self.load_step(step_id).await?.mission_id;
        let _guard = self.locks.acquire(&mission_id).await;

        // Re-read under the lock; a concurrent call may have moved the step.
        let step = self.load_step(step_id).await?;
        let mission = self.load_mission(&step.mission_id).await?;

        if target == StepStatus::WaitingJudge {
            if !mission.is_assignee(user_id) {
                return Err(WorkflowError::forbidden(
                    format!("move step '{step_id}' from {} to {target}", step.status),
                    "only the mission assignee can submit a step for judging",
                ));
            }
        } else if step.judge_id != user_id {
            return Err(WorkflowError::forbidden(
                format!("move step '{step_id}' from {} to {target}", step.status),
                "only the step's judge can decide on it",
            ));
        }

        self.check(self.step_machine.validate_transition(step.status, target))?;

        let siblings = self.repository.list_steps_by_mission(&mission.id).await?;
        let judge_action = matches!(target, StepStatus::Approved | StepStatus::NeedsFix);
        if judge_action && self.settings.enforce_step_order && is_locked(&siblings, step.order) {
            workflow_metrics().record_rejection();
            return Err(WorkflowError::InvalidState(format!(
                "cannot move step '{step_id}' from {} to {target}; it is locked until every earlier step is approved",
                step.status
            )));
        }

        // The sibling list was read under the lock, so applying the target to it gives
        // exactly the set of statuses that will be stored.
        let statuses: Vec<StepStatus> = siblings
            .iter()
            .map(|s| if s.id == step.id { target } else { s.status })
            .collect();
        let mission_change =
            derive_mission_status(&statuses).filter(|derived| *derived != mission.status);

        let (updated, _) = self
            .repository
            .apply_step_transition(step_id, target, mission_change)
            .await?;
        workflow_metrics().record_transition();
        if let Some(derived) = mission_change {
            workflow_metrics().record_derived_change();
            info!(
                mission.id = %mission.id,
                from = %mission.status,
                to = %derived,
                "Mission status derived from steps"
            );
        }

        info!(
            step.id = %step_id,
            from = %step.status,
            to = %target,
            "Judging step advanced"
        );
        self.publish(StepStatusChanged {
            step_id: step_id.to_string(),
            mission_id: mission.id.clone(),
            previous_status: step.status,
            new_status: target,
            judge_id: step.judge_id,
        })
        .await;
        if let Some(new_status) = mission_change {
            self.publish(MissionStatusChanged {
                mission_id: mission.id.clone(),
                previous_status: mission.status,
                new_status,
                acting_user_id: user_id,
            })
            .await;
        }
        Ok(updated)
    }

    // ---- chat -----------------------------------------------------------------

    /// Store a chat message and announce it to the assignee and the relevant judges.
    pub async fn send_chat_message(
        &self,
        mission_id: &str,
        step_id: Option<&str>,
        sender_id: UserId,
        text: &str,
    ) -> Result<ChatMessage> {
        let span = self.span("send_chat_message", Some(mission_id), sender_id);
        async move {
            let text = text.trim();
            if text.is_empty() {
                return Err(WorkflowError::InvalidInput(
                    "message text is empty".to_string(),
                ));
            }
            if text.chars().count() > self.limits.max_chat_len {
                return Err(WorkflowError::InvalidInput(format!(
                    "message text exceeds {} characters",
                    self.limits.max_chat_len
                )));
            }

            let _guard = self.locks.acquire(mission_id).await;
            let mission = self.load_mission(mission_id).await?;
            self.load_user(sender_id).await?;

            let judge_ids: Vec<UserId> = match step_id {
                Some(step_id) => {
                    let step = self
                        .repository
                        .get_step(step_id)
                        .await?
                        .filter(|step| step.mission_id == mission.id)
                        .ok_or_else(|| WorkflowError::not_found("judging step", step_id))?;
                    vec![step.judge_id]
                }
                None => self
                    .repository
                    .list_steps_by_mission(&mission.id)
                    .await?
                    .into_iter()
                    .map(|s| s.judge_id)
                    .collect(),
            };
            let recipient_ids = chat_recipients(mission.assignee_id, judge_ids, sender_id);

            let message = self
                .repository
                .insert_chat_message(ChatMessage {
                    id: new_message_id(),
                    mission_id: mission.id.clone(),
                    step_id: step_id.map(str::to_string),
                    sender_id,
                    text: text.to_string(),
                    created_at: Utc::now(),
                })
                .await?;

            self.publish(ChatMessageSent {
                message_id: message.id.clone(),
                mission_id: mission.id,
                sender_id,
                text: message.text.clone(),
                recipient_ids,
            })
            .await;
            Ok(message)
        }
        .instrument(span)
        .await
    }

    // ---- helpers --------------------------------------------------------------

    fn span(&self, operation: &str, mission_id: Option<&str>, user_id: UserId) -> tracing::Span {
        create_workflow_span(
            operation,
            mission_id,
            Some(user_id),
            &generate_correlation_id(),
        )
    }

    async fn publish(&self, event: impl Into<DomainEvent>) {
        let report = self.bus.publish(event.into()).await;
        if report.failed > 0 {
            warn!(
                failed = report.failed,
                delivered = report.delivered,
                "Some notification listeners failed"
            );
        }
    }

    fn check(&self, result: std::result::Result<(), TransitionError>) -> Result<()> {
        result.map_err(|err| {
            workflow_metrics().record_rejection();
            WorkflowError::from(err)
        })
    }

    async fn load_mission(&self, id: &str) -> Result<Mission> {
        self.repository
            .get_mission(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("mission", id))
    }

    async fn load_step(&self, id: &str) -> Result<JudgingStep> {
        self.repository
            .get_step(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("judging step", id))
    }

    async fn load_user(&self, id: UserId) -> Result<User> {
        self.repository
            .get_user(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("user", id))
    }

    async fn ensure_admin(&self, user_id: UserId, action: &str) -> Result<()> {
        let user = self.load_user(user_id).await?;
        if !user.role.is_admin() {
            return Err(WorkflowError::forbidden(action, "admin role required"));
        }
        Ok(())
    }

    async fn ensure_not_observer(&self, user_id: UserId, action: &str) -> Result<()> {
        let user = self.load_user(user_id).await?;
        if user.role.is_observer() {
            return Err(WorkflowError::forbidden(action, "observers are read-only"));
        }
        Ok(())
    }

    async fn ensure_assignable(&self, assignee_id: UserId) -> Result<()> {
        let assignee = self.load_user(assignee_id).await?;
        if assignee.role.is_observer() {
            return Err(WorkflowError::forbidden(
                format!("assign user {assignee_id}"),
                "an observer cannot be a mission assignee",
            ));
        }
        Ok(())
    }

    async fn ensure_can_judge(&self, judge_id: UserId) -> Result<()> {
        let judge = self.load_user(judge_id).await?;
        if judge.role.is_observer() {
            return Err(WorkflowError::forbidden(
                format!("make user {judge_id} a judge"),
                "an observer cannot judge a step",
            ));
        }
        Ok(())
    }

    fn validate_title(&self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkflowError::InvalidInput("title is required".to_string()));
        }
        if title.chars().count() > self.limits.max_title_len {
            return Err(WorkflowError::InvalidInput(format!(
                "title exceeds {} characters",
                self.limits.max_title_len
            )));
        }
        Ok(())
    }

    fn validate_description(&self, description: &str) -> Result<()> {
        if description.trim().chars().count() > self.limits.max_description_len {
            return Err(WorkflowError::InvalidInput(format!(
                "description exceeds {} characters",
                self.limits.max_description_len
            )));
        }
        Ok(())
    }
}
