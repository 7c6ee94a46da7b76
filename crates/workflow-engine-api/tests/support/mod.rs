// In-memory fakes of `Store`/`DomainEntityReader`/`MessagingPort`/
// `TaskQueuePort` for the end-to-end scenario tests (spec §8 S1-S6),
// mirroring the teacher's pattern of hand-written example-based tests
// rather than a mock framework.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use workflow_engine_contracts::{
    Action, Channel, EntityType, ExecutionLogEntry, Module, NewAction, NewExecutionLogEntry,
    NewScheduledJob, NewState, NewTaskRecord, NewTemplate, NewTransition, NewTrigger, NewWorkflow,
    ScheduledJob, State, Template, TaskPayload, Transition, Trigger, TriggerWithActions,
    UpdateTemplate, UpdateWorkflow, Workflow, WorkflowGraph,
};
use workflow_engine_core::data::DataValue;
use workflow_engine_core::error::{PortResult, StoreError, StoreResult};
use workflow_engine_core::traits::{
    BudgetSnapshot, DomainEntityReader, MessagingPort, ProjectSnapshot, SessionSnapshot, Store,
    TaskQueuePort,
};

/// A mutable Session row, playing the part of the surrounding CRUD
/// system's `sessions` table (spec §3 "[SUPPLEMENT] Entity snapshot
/// tables").
#[derive(Clone)]
pub struct SessionRow {
    pub tenant_id: Uuid,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub therapist_name: Option<String>,
    pub session_type: Option<String>,
    pub amount: Option<f64>,
    pub organization_name: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl SessionRow {
    pub fn new(tenant_id: Uuid, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            patient_name: Some("Ana Sousa".to_string()),
            patient_phone: Some("+351912000000".to_string()),
            patient_email: Some("ana.sousa@example.com".to_string()),
            therapist_name: Some("Dr. João Pinto".to_string()),
            session_type: Some("Fisioterapia".to_string()),
            amount: Some(45.0),
            organization_name: Some("Clínica Exemplo".to_string()),
            scheduled_at,
            created_at: scheduled_at - Duration::days(1),
            status: Some("scheduled".to_string()),
            notes: None,
        }
    }
}

#[derive(Default)]
struct Backend {
    workflows: HashMap<Uuid, Workflow>,
    states: HashMap<Uuid, State>,
    transitions: HashMap<Uuid, Transition>,
    triggers: HashMap<Uuid, Trigger>,
    actions: HashMap<Uuid, Action>,
    templates: HashMap<Uuid, Template>,
    jobs: HashMap<Uuid, ScheduledJob>,
    logs: Vec<ExecutionLogEntry>,
    sessions: HashMap<Uuid, SessionRow>,
    budgets: HashMap<Uuid, BudgetSnapshot>,
    projects: HashMap<Uuid, ProjectSnapshot>,
    tasks: Vec<NewTaskRecord>,
}

/// Backs both `Store` and `DomainEntityReader` off one shared map, so an
/// `update_field` action is immediately visible to the next entity-data
/// fetch — the same round-trip a real Postgres-backed pair would give.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: std::sync::Arc<Mutex<Backend>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_session(&self, id: Uuid, row: SessionRow) {
        self.inner.lock().unwrap().sessions.insert(id, row);
    }

    pub fn session(&self, id: Uuid) -> SessionRow {
        self.inner.lock().unwrap().sessions.get(&id).cloned().unwrap()
    }

    pub fn insert_budget(&self, id: Uuid, snapshot: BudgetSnapshot) {
        self.inner.lock().unwrap().budgets.insert(id, snapshot);
    }

    pub fn insert_project(&self, id: Uuid, snapshot: ProjectSnapshot) {
        self.inner.lock().unwrap().projects.insert(id, snapshot);
    }

    /// Seed a `ScheduledJob` row directly, bypassing `create_scheduled_job`,
    /// so tests can control `created_at`/`status` (spec §8 S6 "Cleanup").
    pub fn insert_job(&self, job: ScheduledJob) {
        self.inner.lock().unwrap().jobs.insert(job.id, job);
    }

    pub fn logs(&self) -> Vec<ExecutionLogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn tasks(&self) -> Vec<NewTaskRecord> {
        self.inner.lock().unwrap().tasks.clone()
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.inner.lock().unwrap().jobs.values().cloned().collect()
    }

    fn load_graph(inner: &Backend, workflow: Workflow) -> WorkflowGraph {
        let states = inner
            .states
            .values()
            .filter(|s| s.workflow_id == workflow.id)
            .cloned()
            .collect::<Vec<_>>();
        let transitions = inner
            .transitions
            .values()
            .filter(|t| t.workflow_id == workflow.id)
            .cloned()
            .collect::<Vec<_>>();
        let triggers = inner
            .triggers
            .values()
            .filter(|t| t.workflow_id == workflow.id)
            .map(|t| {
                let actions = inner
                    .actions
                    .values()
                    .filter(|a| a.trigger_id == t.id)
                    .cloned()
                    .collect::<Vec<_>>();
                TriggerWithActions {
                    trigger: t.clone(),
                    actions,
                }
            })
            .collect::<Vec<_>>();
        WorkflowGraph {
            workflow,
            states,
            transitions,
            triggers,
        }
    }
}

#[async_trait]
impl Store for FakeBackend {
    async fn get_workflow_by_entity_type(
        &self,
        tenant_id: Uuid,
        module: Module,
        entity_type: EntityType,
    ) -> StoreResult<Option<WorkflowGraph>> {
        let inner = self.inner.lock().unwrap();
        let workflow = inner
            .workflows
            .values()
            .find(|w| w.tenant_id == tenant_id && w.module == module && w.entity_type == entity_type && w.active && w.default)
            .cloned();
        Ok(workflow.map(|w| Self::load_graph(&inner, w)))
    }

    async fn get_workflow_graph(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<WorkflowGraph> {
        let inner = self.inner.lock().unwrap();
        let workflow = inner
            .workflows
            .get(&workflow_id)
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))?;
        Ok(Self::load_graph(&inner, workflow))
    }

    async fn list_workflows(&self, tenant_id: Uuid) -> StoreResult<Vec<Workflow>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .workflows
            .values()
            .filter(|w| w.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn get_trigger_with_workflow(
        &self,
        tenant_id: Uuid,
        trigger_id: Uuid,
    ) -> StoreResult<(Trigger, Vec<Action>, Workflow)> {
        let inner = self.inner.lock().unwrap();
        let trigger = inner
            .triggers
            .get(&trigger_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("trigger {trigger_id}")))?;
        let workflow = inner
            .workflows
            .get(&trigger.workflow_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("workflow {}", trigger.workflow_id)))?;
        if workflow.tenant_id != tenant_id {
            return Err(StoreError::TenantMismatch);
        }
        let actions = inner
            .actions
            .values()
            .filter(|a| a.trigger_id == trigger_id)
            .cloned()
            .collect();
        Ok((trigger, actions, workflow))
    }

    async fn list_active_recurring_triggers(&self) -> StoreResult<Vec<(Trigger, Workflow)>> {
        use workflow_engine_contracts::TriggerType;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .triggers
            .values()
            .filter(|t| t.active && t.trigger_type == TriggerType::Recurring)
            .filter_map(|t| inner.workflows.get(&t.workflow_id).filter(|w| w.active).map(|w| (t.clone(), w.clone())))
            .collect())
    }

    async fn create_workflow(&self, tenant_id: Uuid, input: NewWorkflow) -> StoreResult<Workflow> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let workflow = Workflow {
            id,
            tenant_id,
            name: input.name,
            description: input.description,
            module: input.module,
            entity_type: input.entity_type,
            active: true,
            default: input.default,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().workflows.insert(id, workflow.clone());
        Ok(workflow)
    }

    async fn update_workflow(&self, tenant_id: Uuid, workflow_id: Uuid, input: UpdateWorkflow) -> StoreResult<Workflow> {
        let mut inner = self.inner.lock().unwrap();
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .filter(|w| w.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))?;
        if let Some(name) = input.name {
            workflow.name = name;
        }
        if input.description.is_some() {
            workflow.description = input.description;
        }
        if let Some(active) = input.active {
            workflow.active = active;
        }
        if let Some(default) = input.default {
            workflow.default = default;
        }
        workflow.updated_at = Utc::now();
        Ok(workflow.clone())
    }

    async fn delete_workflow(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let found = inner.workflows.get(&workflow_id).map(|w| w.tenant_id == tenant_id).unwrap_or(false);
        if !found {
            return Err(StoreError::NotFound(format!("workflow {workflow_id}")));
        }
        inner.workflows.remove(&workflow_id);
        Ok(())
    }

    async fn create_state(&self, _tenant_id: Uuid, workflow_id: Uuid, input: NewState) -> StoreResult<State> {
        let id = Uuid::now_v7();
        let state = State {
            id,
            workflow_id,
            name: input.name,
            display_name: input.display_name,
            state_type: input.state_type,
            color: input.color,
            position: input.position,
        };
        self.inner.lock().unwrap().states.insert(id, state.clone());
        Ok(state)
    }

    async fn delete_state(&self, _tenant_id: Uuid, state_id: Uuid) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .states
            .remove(&state_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("state {state_id}")))
    }

    async fn create_transition(&self, _tenant_id: Uuid, workflow_id: Uuid, input: NewTransition) -> StoreResult<Transition> {
        let id = Uuid::now_v7();
        let transition = Transition {
            id,
            workflow_id,
            from_state: input.from_state,
            to_state: input.to_state,
            name: input.name,
            requires_confirmation: input.requires_confirmation,
        };
        self.inner.lock().unwrap().transitions.insert(id, transition.clone());
        Ok(transition)
    }

    async fn delete_transition(&self, _tenant_id: Uuid, transition_id: Uuid) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .transitions
            .remove(&transition_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("transition {transition_id}")))
    }

    async fn create_trigger(&self, _tenant_id: Uuid, workflow_id: Uuid, input: NewTrigger) -> StoreResult<Trigger> {
        let id = Uuid::now_v7();
        let trigger = Trigger {
            id,
            workflow_id,
            state_id: input.state_id,
            transition_id: input.transition_id,
            trigger_type: input.trigger_type,
            time_offset_minutes: input.time_offset_minutes,
            time_field: input.time_field,
            recurring_cron: input.recurring_cron,
            conditions: input.conditions,
            active: true,
        };
        self.inner.lock().unwrap().triggers.insert(id, trigger.clone());
        Ok(trigger)
    }

    async fn set_trigger_active(&self, _tenant_id: Uuid, trigger_id: Uuid, active: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let trigger = inner
            .triggers
            .get_mut(&trigger_id)
            .ok_or_else(|| StoreError::NotFound(format!("trigger {trigger_id}")))?;
        trigger.active = active;
        Ok(())
    }

    async fn delete_trigger(&self, _tenant_id: Uuid, trigger_id: Uuid) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .triggers
            .remove(&trigger_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("trigger {trigger_id}")))
    }

    async fn create_action(&self, _tenant_id: Uuid, trigger_id: Uuid, input: NewAction) -> StoreResult<Action> {
        let id = Uuid::now_v7();
        let action = Action {
            id,
            trigger_id,
            action_type: input.action_type,
            order: input.order,
            template_id: input.template_id,
            config: input.config,
            active: true,
        };
        self.inner.lock().unwrap().actions.insert(id, action.clone());
        Ok(action)
    }

    async fn delete_action(&self, _tenant_id: Uuid, action_id: Uuid) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .actions
            .remove(&action_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("action {action_id}")))
    }

    async fn create_template(&self, tenant_id: Uuid, input: NewTemplate) -> StoreResult<Template> {
        let id = Uuid::now_v7();
        let template = Template {
            id,
            tenant_id,
            name: input.name,
            channel: input.channel,
            subject: input.subject,
            body: input.body,
            variables: input.variables,
            active: true,
        };
        self.inner.lock().unwrap().templates.insert(id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<Template> {
        self.inner
            .lock()
            .unwrap()
            .templates
            .get(&template_id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))
    }

    async fn list_templates(&self, tenant_id: Uuid, channel: Option<Channel>) -> StoreResult<Vec<Template>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .templates
            .values()
            .filter(|t| t.tenant_id == tenant_id && channel.map(|c| c == t.channel).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn update_template(&self, tenant_id: Uuid, template_id: Uuid, input: UpdateTemplate) -> StoreResult<Template> {
        let mut inner = self.inner.lock().unwrap();
        let template = inner
            .templates
            .get_mut(&template_id)
            .filter(|t| t.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))?;
        if let Some(name) = input.name {
            template.name = name;
        }
        if let Some(subject) = input.subject {
            template.subject = subject;
        }
        if let Some(body) = input.body {
            template.body = body;
        }
        if let Some(variables) = input.variables {
            template.variables = variables;
        }
        if let Some(active) = input.active {
            template.active = active;
        }
        Ok(template.clone())
    }

    async fn delete_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let found = inner.templates.get(&template_id).map(|t| t.tenant_id == tenant_id).unwrap_or(false);
        if !found {
            return Err(StoreError::NotFound(format!("template {template_id}")));
        }
        inner.templates.remove(&template_id);
        Ok(())
    }

    async fn create_scheduled_job(&self, input: NewScheduledJob) -> StoreResult<ScheduledJob> {
        let id = Uuid::now_v7();
        let job = ScheduledJob {
            id,
            tenant_id: input.tenant_id,
            trigger_id: input.trigger_id,
            entity_type: input.entity_type,
            entity_id: input.entity_id,
            scheduled_for: input.scheduled_for,
            status: workflow_engine_contracts::JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.inner.lock().unwrap().jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn cancel_pending(&self, tenant_id: Uuid, entity_type: EntityType, entity_id: Uuid) -> StoreResult<u64> {
        use workflow_engine_contracts::JobStatus;
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0;
        for job in inner.jobs.values_mut() {
            if job.tenant_id == tenant_id
                && job.entity_type == entity_type
                && job.entity_id == entity_id
                && job.status == JobStatus::Pending
            {
                job.status = JobStatus::Cancelled;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn list_due_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<ScheduledJob>> {
        use workflow_engine_contracts::JobStatus;
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<_> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_for <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| j.scheduled_for);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn claim_job(&self, job_id: Uuid) -> StoreResult<bool> {
        use workflow_engine_contracts::JobStatus;
        let mut inner = self.inner.lock().unwrap();
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Processing;
                job.attempts += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_job(&self, job_id: Uuid) -> StoreResult<()> {
        use workflow_engine_contracts::JobStatus;
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .filter(|j| j.status == JobStatus::Processing)
            .ok_or_else(|| StoreError::NotFound(format!("processing job {job_id}")))?;
        job.status = JobStatus::Completed;
        job.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: String) -> StoreResult<()> {
        use workflow_engine_contracts::JobStatus;
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .filter(|j| j.status == JobStatus::Processing)
            .ok_or_else(|| StoreError::NotFound(format!("processing job {job_id}")))?;
        job.status = JobStatus::Failed;
        job.last_error = Some(error);
        job.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn requeue_job(&self, job_id: Uuid, error: String) -> StoreResult<()> {
        use workflow_engine_contracts::JobStatus;
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(&job_id)
            .filter(|j| j.status == JobStatus::Processing)
            .ok_or_else(|| StoreError::NotFound(format!("processing job {job_id}")))?;
        job.status = JobStatus::Pending;
        job.last_error = Some(error);
        Ok(())
    }

    async fn cleanup_old_jobs(&self, older_than: Duration) -> StoreResult<u64> {
        use workflow_engine_contracts::JobStatus;
        let cutoff = Utc::now() - older_than;
        let mut inner = self.inner.lock().unwrap();
        let before = inner.jobs.len();
        inner.jobs.retain(|_, j| {
            !matches!(j.status, JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed) || j.created_at >= cutoff
        });
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn append_log(&self, entry: NewExecutionLogEntry) -> StoreResult<ExecutionLogEntry> {
        let log = ExecutionLogEntry {
            id: Uuid::now_v7(),
            tenant_id: entry.tenant_id,
            workflow_id: entry.workflow_id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            trigger_id: entry.trigger_id,
            action_id: entry.action_id,
            event_type: entry.event_type,
            from_state: entry.from_state,
            to_state: entry.to_state,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().logs.push(log.clone());
        Ok(log)
    }

    async fn update_entity_field(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        field: &str,
        value: &DataValue,
    ) -> StoreResult<()> {
        if !workflow_engine_core::catalogue::is_allowed_field(entity_type, field) {
            return Err(StoreError::Conflict(format!("field '{field}' is not writable on {entity_type}")));
        }
        let mut inner = self.inner.lock().unwrap();
        match entity_type {
            EntityType::Session => {
                let row = inner
                    .sessions
                    .get_mut(&entity_id)
                    .filter(|s| s.tenant_id == tenant_id)
                    .ok_or_else(|| StoreError::NotFound(format!("session {entity_id}")))?;
                match field {
                    "status" => row.status = Some(as_text(value)),
                    "notes" => row.notes = Some(as_text(value)),
                    _ => {}
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn record_task(&self, _tenant_id: Uuid, input: NewTaskRecord) -> StoreResult<Uuid> {
        let id = Uuid::now_v7();
        self.inner.lock().unwrap().tasks.push(input);
        Ok(id)
    }
}

fn as_text(value: &DataValue) -> String {
    match value {
        DataValue::Text(s) => s.clone(),
        other => other.render(),
    }
}

#[async_trait]
impl DomainEntityReader for FakeBackend {
    async fn fetch_session(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<SessionSnapshot>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.sessions.get(&entity_id).filter(|s| s.tenant_id == tenant_id).map(|s| SessionSnapshot {
            patient_name: s.patient_name.clone(),
            patient_phone: s.patient_phone.clone(),
            patient_email: s.patient_email.clone(),
            therapist_name: s.therapist_name.clone(),
            session_date: Some(s.scheduled_at.format("%Y-%m-%d").to_string()),
            session_time: Some(s.scheduled_at.format("%H:%M").to_string()),
            session_type: s.session_type.clone(),
            amount: s.amount,
            organization_name: s.organization_name.clone(),
            scheduled_at: s.scheduled_at,
            created_at: s.created_at,
        }))
    }

    async fn fetch_budget(&self, _tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<BudgetSnapshot>> {
        Ok(self.inner.lock().unwrap().budgets.get(&entity_id).cloned())
    }

    async fn fetch_project(&self, _tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<ProjectSnapshot>> {
        Ok(self.inner.lock().unwrap().projects.get(&entity_id).cloned())
    }
}

/// Records every call instead of sending anything, so tests can assert on
/// what the Action Executor tried to do (spec §4.4 `SendWhatsApp`/`SendEmail`).
#[derive(Clone, Default)]
pub struct RecordingMessaging {
    sent: std::sync::Arc<Mutex<Vec<(String, String, Option<String>)>>>,
}

impl RecordingMessaging {
    pub fn sent(&self) -> Vec<(String, String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessaging {
    async fn send_whatsapp(&self, to: &str, body: &str) -> PortResult<()> {
        self.sent.lock().unwrap().push(("whatsapp".to_string(), to.to_string(), Some(body.to_string())));
        Ok(())
    }

    async fn send_email(&self, to: &str, subject: Option<&str>, body: &str) -> PortResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(("email".to_string(), to.to_string(), subject.map(|s| format!("{s}\n{body}"))));
        Ok(())
    }
}

/// Records every task handed to `TaskQueuePort::enqueue_task` instead of
/// putting it on a channel, so scenario tests can assert on what the
/// Scheduler's sweep decided to dispatch without a background worker.
#[derive(Clone, Default)]
pub struct RecordingQueue {
    enqueued: std::sync::Arc<Mutex<Vec<(TaskPayload, String)>>>,
}

impl RecordingQueue {
    pub fn drain(&self) -> Vec<(TaskPayload, String)> {
        std::mem::take(&mut *self.enqueued.lock().unwrap())
    }
}

#[async_trait]
impl TaskQueuePort for RecordingQueue {
    async fn enqueue_task(&self, payload: TaskPayload, idempotency_key: &str) -> PortResult<()> {
        self.enqueued.lock().unwrap().push((payload, idempotency_key.to_string()));
        Ok(())
    }
}

/// Stands in for the `SweepTicker`/`DispatchWorker` pair (spec §4.5 point
/// 3), but against a caller-supplied `now` instead of `Utc::now()` so tests
/// can advance the clock without waiting in real time. Mirrors
/// `SweepTicker::sweep_once` (claim, enqueue) followed immediately by
/// `DispatchWorker::handle` (execute, reconcile the job) — the in-process
/// queue has no background consumer in tests, so draining it happens
/// synchronously in the same call.
pub async fn run_sweep(
    backend: &FakeBackend,
    engine: &workflow_engine_core::engine::Engine,
    queue: &RecordingQueue,
    now: DateTime<Utc>,
) -> usize {
    let due = Store::list_due_pending(backend, now, 100).await.unwrap();
    let mut dispatched = 0;
    for job in due {
        if !Store::claim_job(backend, job.id).await.unwrap() {
            continue;
        }
        let payload = TaskPayload {
            tenant_id: job.tenant_id,
            trigger_id: job.trigger_id,
            entity_type: job.entity_type,
            entity_id: job.entity_id,
        };
        TaskQueuePort::enqueue_task(queue, payload, &format!("job:{}:{}", job.id, job.attempts + 1))
            .await
            .unwrap();

        let result = engine
            .execute_trigger_by_id(job.tenant_id, job.trigger_id, job.entity_type, job.entity_id)
            .await;
        match result {
            Ok(()) => Store::complete_job(backend, job.id).await.unwrap(),
            Err(err) => Store::fail_job(backend, job.id, err.to_string()).await.unwrap(),
        }
        dispatched += 1;
    }
    dispatched
}
