// Ports the engine depends on (spec §4.1, §4.3, §6). Everything here is a
// trait so `workflow-engine-core` never links against sqlx or a messaging
// SDK directly; `workflow-engine-storage` and `workflow-engine-worker`
// provide the real implementations, tests provide in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use workflow_engine_contracts::{
    Action, ExecutionLogEntry, NewAction, NewExecutionLogEntry, NewScheduledJob, NewState,
    NewTaskRecord, NewTemplate, NewTransition, NewTrigger, NewWorkflow, ScheduledJob, State,
    Template, TaskPayload, Transition, Trigger, TriggerWithActions, UpdateTemplate, UpdateWorkflow,
    Workflow, WorkflowGraph,
};
use workflow_engine_contracts::{Channel, EntityType, Module};

use crate::data::{DataMap, DataValue};
use crate::error::{PortResult, Result, StoreResult};

/// Every read and write the Engine, Scheduler and administration surface
/// make against persisted state (spec §4.1). One trait covers both the
/// workflow graph and the scheduled-job queue: a real implementation is a
/// single Postgres pool, and splitting them would only push the same
/// transactional boundary into two traits.
#[async_trait]
pub trait Store: Send + Sync {
    // -- workflow graph reads --------------------------------------------

    /// The active workflow configured for `(tenant, module, entity_type)`,
    /// fully materialised (states, transitions, triggers-with-actions) in
    /// one round-trip (spec §4.1, §5). `None` when no active workflow is
    /// configured for that entity type.
    async fn get_workflow_by_entity_type(
        &self,
        tenant_id: Uuid,
        module: Module,
        entity_type: EntityType,
    ) -> StoreResult<Option<WorkflowGraph>>;

    async fn get_workflow_graph(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<WorkflowGraph>;

    async fn list_workflows(&self, tenant_id: Uuid) -> StoreResult<Vec<Workflow>>;

    /// A single Trigger-with-Actions plus the owning Workflow, for the
    /// dispatch worker, which only knows a `trigger_id` (spec §4.1).
    async fn get_trigger_with_workflow(
        &self,
        tenant_id: Uuid,
        trigger_id: Uuid,
    ) -> StoreResult<(Trigger, Vec<Action>, Workflow)>;

    /// Every active Recurring trigger across all tenants, for the
    /// Scheduler's per-minute re-scan (spec §4.5). Deliberately not
    /// tenant-scoped: the scan itself is a system-wide sweep, dispatch
    /// afterwards stays scoped to the trigger's own tenant.
    async fn list_active_recurring_triggers(&self) -> StoreResult<Vec<(Trigger, Workflow)>>;

    // -- workflow graph writes (administration surface) ------------------

    async fn create_workflow(&self, tenant_id: Uuid, input: NewWorkflow) -> StoreResult<Workflow>;
    async fn update_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        input: UpdateWorkflow,
    ) -> StoreResult<Workflow>;
    async fn delete_workflow(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<()>;

    async fn create_state(&self, tenant_id: Uuid, workflow_id: Uuid, input: NewState) -> StoreResult<State>;
    async fn delete_state(&self, tenant_id: Uuid, state_id: Uuid) -> StoreResult<()>;

    async fn create_transition(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        input: NewTransition,
    ) -> StoreResult<Transition>;
    async fn delete_transition(&self, tenant_id: Uuid, transition_id: Uuid) -> StoreResult<()>;

    async fn create_trigger(&self, tenant_id: Uuid, workflow_id: Uuid, input: NewTrigger) -> StoreResult<Trigger>;
    async fn set_trigger_active(&self, tenant_id: Uuid, trigger_id: Uuid, active: bool) -> StoreResult<()>;
    async fn delete_trigger(&self, tenant_id: Uuid, trigger_id: Uuid) -> StoreResult<()>;

    async fn create_action(&self, tenant_id: Uuid, trigger_id: Uuid, input: NewAction) -> StoreResult<Action>;
    async fn delete_action(&self, tenant_id: Uuid, action_id: Uuid) -> StoreResult<()>;

    async fn create_template(&self, tenant_id: Uuid, input: NewTemplate) -> StoreResult<Template>;
    async fn get_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<Template>;
    async fn list_templates(&self, tenant_id: Uuid, channel: Option<Channel>) -> StoreResult<Vec<Template>>;
    async fn update_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        input: UpdateTemplate,
    ) -> StoreResult<Template>;
    async fn delete_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<()>;

    // -- scheduled job queue (spec §4.5) ----------------------------------

    async fn create_scheduled_job(&self, input: NewScheduledJob) -> StoreResult<ScheduledJob>;

    /// Cancel every Pending job for `(tenant, entity_type, entity_id)`, e.g.
    /// on a state re-entry or an OnEntityDeleted event (spec §4.5, §6).
    /// Returns the number of jobs cancelled.
    async fn cancel_pending(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<u64>;

    async fn list_due_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<ScheduledJob>>;

    /// Atomically transition one job `pending -> processing`. Returns
    /// `false` if the job was no longer pending (already claimed,
    /// cancelled, or gone) — the sole concurrency anchor that makes
    /// at-least-once queue delivery behave as at-most-once execution
    /// (spec §4.5, §9 Open Questions).
    async fn claim_job(&self, job_id: Uuid) -> StoreResult<bool>;

    async fn complete_job(&self, job_id: Uuid) -> StoreResult<()>;

    /// Move a job back to `failed` after exhausting retries.
    async fn fail_job(&self, job_id: Uuid, error: String) -> StoreResult<()>;

    /// Move a claimed job back to `pending` with `attempts` already
    /// incremented, for transient failures below `max_attempts` — the
    /// resolution to the EnqueueTask-after-claim Open Question (spec §9).
    async fn requeue_job(&self, job_id: Uuid, error: String) -> StoreResult<()>;

    async fn cleanup_old_jobs(&self, older_than: Duration) -> StoreResult<u64>;

    // -- execution log (spec §4.6) ----------------------------------------

    /// Append one audit row. Implementations should make failures here
    /// non-fatal to the caller (spec §4.6: "a log write failure never
    /// rolls back the action it is recording") — callers that want that
    /// behaviour should prefer the `append_log_soft` free function.
    async fn append_log(&self, entry: NewExecutionLogEntry) -> StoreResult<ExecutionLogEntry>;

    // -- action sinks ------------------------------------------------------

    /// `update_field` (spec §4.4). Implementations must validate `field`
    /// against the per-entity-type allow-list themselves — never trust a
    /// caller-supplied column name into a query string.
    async fn update_entity_field(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        field: &str,
        value: &DataValue,
    ) -> StoreResult<()>;

    /// `create_task` (spec §4.4): append one row to the task sink.
    async fn record_task(&self, tenant_id: Uuid, input: NewTaskRecord) -> StoreResult<Uuid>;
}

/// Append a log entry and swallow the error, per spec §4.6: a logging
/// failure must never surface to (or roll back) the caller that is
/// recording a real effect.
pub async fn append_log_soft(store: &dyn Store, entry: NewExecutionLogEntry) {
    if let Err(err) = store.append_log(entry).await {
        tracing::warn!(error = %err, "execution log write failed");
    }
}

/// One entity's resolved attributes for the Session entity type
/// (spec §4.3 **[SUPPLEMENT]**: a minimal snapshot the Entity Data
/// Provider joins across to build the Session variable catalogue).
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub therapist_name: Option<String>,
    pub session_date: Option<String>,
    pub session_time: Option<String>,
    pub session_type: Option<String>,
    pub amount: Option<f64>,
    pub organization_name: Option<String>,
    /// The entity's own scheduled datetime; the usual `time_field` a
    /// TimeBefore/TimeAfter trigger is offset from.
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BudgetSnapshot {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub project_name: Option<String>,
    pub budget_total: Option<f64>,
    pub budget_link: Option<String>,
    pub approval_link: Option<String>,
    pub organization_name: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub project_name: Option<String>,
    pub project_status: Option<String>,
    pub organization_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The read side of the Entity Data Provider (spec §4.3): resolves one
/// entity's raw attributes. The provider itself (in `entity_data.rs`)
/// turns these snapshots into the flat `DataMap` the renderer consumes;
/// this trait only has to know how to fetch one entity, not how the
/// catalogue is shaped.
#[async_trait]
pub trait DomainEntityReader: Send + Sync {
    async fn fetch_session(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<SessionSnapshot>>;
    async fn fetch_budget(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<BudgetSnapshot>>;
    async fn fetch_project(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<ProjectSnapshot>>;
}

/// Outbound messaging capability (spec §6). `send_whatsapp`/`send_email`
/// map 1:1 onto the `send_whatsapp`/`send_email` Action types; the Action
/// Executor treats an unconfigured port as a soft success, logging the
/// skip rather than failing the action (spec §4.4).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_whatsapp(&self, to: &str, body: &str) -> PortResult<()>;
    async fn send_email(&self, to: &str, subject: Option<&str>, body: &str) -> PortResult<()>;
}

/// Outbound task queue capability (spec §6): how a scheduled job becomes
/// a dispatch worker invocation. `idempotency_key` lets a queue backend
/// de-duplicate redeliveries upstream of `ClaimJob`, which remains the
/// authoritative concurrency guard.
#[async_trait]
pub trait TaskQueuePort: Send + Sync {
    async fn enqueue_task(&self, payload: TaskPayload, idempotency_key: &str) -> PortResult<()>;
}

/// The scheduling half of spec §4.5, as seen from the Engine: when a state
/// is entered the Engine hands over the TimeBefore/TimeAfter triggers
/// active on that state plus the freshly-resolved data map, and the
/// Scheduler computes and persists the absolute firing times. Kept as a
/// port (rather than folding the math into the Engine) so the sweep/claim
/// machinery and the schedule-on-entry math stay in one crate
/// (`workflow-engine-worker`) without `workflow-engine-core` depending on
/// it.
#[async_trait]
pub trait SchedulerPort: Send + Sync {
    /// Persist one ScheduledJob per time-based trigger in `triggers`,
    /// computing each absolute `scheduled_for` from `data[trigger.time_field]`
    /// (or the entity's `created_at` when absent) offset by
    /// `time_offset_minutes`. Triggers with no resolvable time field are
    /// skipped with a warning, not failed (spec §4.5 edge cases).
    async fn schedule_for_state(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        triggers: &[TriggerWithActions],
        data: &DataMap,
    ) -> Result<()>;

    /// Cancel every Pending job for this entity, e.g. on re-entering a
    /// state or on an OnEntityDeleted event (spec §4.5, §6).
    async fn cancel_pending(&self, tenant_id: Uuid, entity_type: EntityType, entity_id: Uuid) -> Result<()>;
}
