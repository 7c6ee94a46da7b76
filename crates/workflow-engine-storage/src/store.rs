// Store implementation (spec §4.1): one `Database` wrapping a `PgPool`, one
// `impl` block per entity family, matching the teacher's
// `everruns-storage::repositories::Database` layout. Every query binds
// `tenant_id`; every write that targets an existing row filters by it too,
// so a stale/forged tenant id fails as `NotFound`, not as a silent
// cross-tenant mutation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use workflow_engine_contracts::{
    Action, EntityType, ExecutionLogEntry, Module, NewAction, NewExecutionLogEntry,
    NewScheduledJob, NewState, NewTaskRecord, NewTemplate, NewTransition, NewTrigger, NewWorkflow,
    ScheduledJob, State, Template, Transition, Trigger, TriggerWithActions, UpdateTemplate,
    UpdateWorkflow, Workflow, WorkflowGraph,
};
use workflow_engine_core::data::DataValue;
use workflow_engine_core::error::{StoreError, StoreResult};
use workflow_engine_core::traits::Store;

use crate::models::{
    ActionRow, ExecutionLogEntryRow, ScheduledJobRow, StateRow, TemplateRow, TransitionRow,
    TriggerRow, WorkflowRow,
};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn from_url(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Assemble a full graph from a workflow row already known to match the
    /// caller's tenant (spec §4.1: "eagerly loaded in one store round-trip").
    async fn load_graph(&self, workflow_row: WorkflowRow) -> StoreResult<WorkflowGraph> {
        let workflow_id = workflow_row.id;

        let state_rows = sqlx::query_as::<_, StateRow>(
            r#"SELECT id, workflow_id, name, display_name, state_type, color, position
               FROM workflow_states WHERE workflow_id = $1 ORDER BY position ASC"#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let transition_rows = sqlx::query_as::<_, TransitionRow>(
            r#"SELECT id, workflow_id, from_state, to_state, name, requires_confirmation
               FROM workflow_transitions WHERE workflow_id = $1"#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let trigger_rows = sqlx::query_as::<_, TriggerRow>(
            r#"SELECT id, workflow_id, state_id, transition_id, trigger_type, time_offset_minutes,
                      time_field, recurring_cron, conditions, active
               FROM workflow_triggers WHERE workflow_id = $1"#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let trigger_ids: Vec<Uuid> = trigger_rows.iter().map(|t| t.id).collect();
        let action_rows = if trigger_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, ActionRow>(
                r#"SELECT id, trigger_id, action_type, "order", template_id, config, active
                   FROM workflow_actions WHERE trigger_id = ANY($1) ORDER BY "order" ASC"#,
            )
            .bind(&trigger_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
        };

        let triggers = trigger_rows
            .into_iter()
            .map(|row| {
                let trigger: Trigger = row.into();
                let actions: Vec<Action> = action_rows
                    .iter()
                    .filter(|a| a.trigger_id == trigger.id)
                    .cloned()
                    .map(Action::from)
                    .collect();
                TriggerWithActions { trigger, actions }
            })
            .collect();

        Ok(WorkflowGraph {
            workflow: workflow_row.into(),
            states: state_rows.into_iter().map(State::from).collect(),
            transitions: transition_rows.into_iter().map(Transition::from).collect(),
            triggers,
        })
    }
}

#[async_trait]
impl Store for Database {
    // -- workflow graph reads --------------------------------------------

    async fn get_workflow_by_entity_type(
        &self,
        tenant_id: Uuid,
        module: Module,
        entity_type: EntityType,
    ) -> StoreResult<Option<WorkflowGraph>> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"SELECT id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at
               FROM workflows
               WHERE tenant_id = $1 AND module = $2 AND entity_type = $3 AND active AND is_default
               LIMIT 1"#,
        )
        .bind(tenant_id)
        .bind(module.to_string())
        .bind(entity_type.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(row) => Ok(Some(self.load_graph(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_workflow_graph(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<WorkflowGraph> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"SELECT id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at
               FROM workflows WHERE id = $1 AND tenant_id = $2"#,
        )
        .bind(workflow_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))?;

        self.load_graph(row).await
    }

    async fn list_workflows(&self, tenant_id: Uuid) -> StoreResult<Vec<Workflow>> {
        let rows = sqlx::query_as::<_, WorkflowRow>(
            r#"SELECT id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at
               FROM workflows WHERE tenant_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Workflow::from).collect())
    }

    async fn get_trigger_with_workflow(
        &self,
        tenant_id: Uuid,
        trigger_id: Uuid,
    ) -> StoreResult<(Trigger, Vec<Action>, Workflow)> {
        let trigger_row = sqlx::query_as::<_, TriggerRow>(
            r#"SELECT id, workflow_id, state_id, transition_id, trigger_type, time_offset_minutes,
                      time_field, recurring_cron, conditions, active
               FROM workflow_triggers WHERE id = $1 AND tenant_id = $2"#,
        )
        .bind(trigger_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("trigger {trigger_id}")))?;

        let workflow_row = sqlx::query_as::<_, WorkflowRow>(
            r#"SELECT id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at
               FROM workflows WHERE id = $1"#,
        )
        .bind(trigger_row.workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("workflow {}", trigger_row.workflow_id)))?;

        if workflow_row.tenant_id != tenant_id {
            return Err(StoreError::TenantMismatch);
        }

        let action_rows = sqlx::query_as::<_, ActionRow>(
            r#"SELECT id, trigger_id, action_type, "order", template_id, config, active
               FROM workflow_actions WHERE trigger_id = $1 ORDER BY "order" ASC"#,
        )
        .bind(trigger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok((
            trigger_row.into(),
            action_rows.into_iter().map(Action::from).collect(),
            workflow_row.into(),
        ))
    }

    async fn list_active_recurring_triggers(&self) -> StoreResult<Vec<(Trigger, Workflow)>> {
        self.list_active_recurring_triggers_fallback().await
    }

    // -- workflow graph writes (administration surface) ------------------

    async fn create_workflow(&self, tenant_id: Uuid, input: NewWorkflow) -> StoreResult<Workflow> {
        let id = Uuid::now_v7();
        if input.default {
            sqlx::query(
                r#"UPDATE workflows SET is_default = FALSE
                   WHERE tenant_id = $1 AND module = $2 AND entity_type = $3"#,
            )
            .bind(tenant_id)
            .bind(input.module.to_string())
            .bind(input.entity_type.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        }

        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"INSERT INTO workflows (id, tenant_id, name, description, module, entity_type, is_default)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.module.to_string())
        .bind(input.entity_type.to_string())
        .bind(input.default)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn update_workflow(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        input: UpdateWorkflow,
    ) -> StoreResult<Workflow> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"UPDATE workflows SET
                   name = COALESCE($3, name),
                   description = COALESCE($4, description),
                   active = COALESCE($5, active),
                   is_default = COALESCE($6, is_default),
                   updated_at = now()
               WHERE id = $1 AND tenant_id = $2
               RETURNING id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at"#,
        )
        .bind(workflow_id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.active)
        .bind(input.default)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("workflow {workflow_id}")))?;

        Ok(row.into())
    }

    async fn delete_workflow(&self, tenant_id: Uuid, workflow_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1 AND tenant_id = $2")
            .bind(workflow_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("workflow {workflow_id}"))
    }

    async fn create_state(&self, tenant_id: Uuid, workflow_id: Uuid, input: NewState) -> StoreResult<State> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, StateRow>(
            r#"INSERT INTO workflow_states (id, tenant_id, workflow_id, name, display_name, state_type, color, position)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, workflow_id, name, display_name, state_type, color, position"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(workflow_id)
        .bind(&input.name)
        .bind(&input.display_name)
        .bind(input.state_type.to_string())
        .bind(&input.color)
        .bind(input.position)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn delete_state(&self, tenant_id: Uuid, state_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM workflow_states WHERE id = $1 AND tenant_id = $2")
            .bind(state_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("state {state_id}"))
    }

    async fn create_transition(
        &self,
        tenant_id: Uuid,
        workflow_id: Uuid,
        input: NewTransition,
    ) -> StoreResult<Transition> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, TransitionRow>(
            r#"INSERT INTO workflow_transitions (id, tenant_id, workflow_id, from_state, to_state, name, requires_confirmation)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, workflow_id, from_state, to_state, name, requires_confirmation"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(workflow_id)
        .bind(input.from_state)
        .bind(input.to_state)
        .bind(&input.name)
        .bind(input.requires_confirmation)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn delete_transition(&self, tenant_id: Uuid, transition_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM workflow_transitions WHERE id = $1 AND tenant_id = $2")
            .bind(transition_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("transition {transition_id}"))
    }

    async fn create_trigger(&self, tenant_id: Uuid, workflow_id: Uuid, input: NewTrigger) -> StoreResult<Trigger> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, TriggerRow>(
            r#"INSERT INTO workflow_triggers
                   (id, tenant_id, workflow_id, state_id, transition_id, trigger_type,
                    time_offset_minutes, time_field, recurring_cron, conditions)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, workflow_id, state_id, transition_id, trigger_type, time_offset_minutes,
                         time_field, recurring_cron, conditions, active"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(workflow_id)
        .bind(input.state_id)
        .bind(input.transition_id)
        .bind(input.trigger_type.to_string())
        .bind(input.time_offset_minutes)
        .bind(&input.time_field)
        .bind(&input.recurring_cron)
        .bind(&input.conditions)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn set_trigger_active(&self, tenant_id: Uuid, trigger_id: Uuid, active: bool) -> StoreResult<()> {
        let result = sqlx::query("UPDATE workflow_triggers SET active = $3 WHERE id = $1 AND tenant_id = $2")
            .bind(trigger_id)
            .bind(tenant_id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("trigger {trigger_id}"))
    }

    async fn delete_trigger(&self, tenant_id: Uuid, trigger_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM workflow_triggers WHERE id = $1 AND tenant_id = $2")
            .bind(trigger_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("trigger {trigger_id}"))
    }

    async fn create_action(&self, tenant_id: Uuid, trigger_id: Uuid, input: NewAction) -> StoreResult<Action> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, ActionRow>(
            r#"INSERT INTO workflow_actions (id, tenant_id, trigger_id, action_type, "order", template_id, config)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, trigger_id, action_type, "order", template_id, config, active"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(trigger_id)
        .bind(input.action_type.to_string())
        .bind(input.order)
        .bind(input.template_id)
        .bind(&input.config)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn delete_action(&self, tenant_id: Uuid, action_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM workflow_actions WHERE id = $1 AND tenant_id = $2")
            .bind(action_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("action {action_id}"))
    }

    async fn create_template(&self, tenant_id: Uuid, input: NewTemplate) -> StoreResult<Template> {
        let id = Uuid::now_v7();
        let variables_json = serde_json::to_value(&input.variables).map_err(|e| StoreError::Internal(e.into()))?;
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"INSERT INTO templates (id, tenant_id, name, channel, subject, body, variables)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, tenant_id, name, channel, subject, body, variables, active"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(input.channel.to_string())
        .bind(&input.subject)
        .bind(&input.body)
        .bind(&variables_json)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn get_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<Template> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"SELECT id, tenant_id, name, channel, subject, body, variables, active
               FROM templates WHERE id = $1 AND tenant_id = $2"#,
        )
        .bind(template_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))?;

        Ok(row.into())
    }

    async fn list_templates(&self, tenant_id: Uuid, channel: Option<workflow_engine_contracts::Channel>) -> StoreResult<Vec<Template>> {
        let rows = match channel {
            Some(channel) => {
                sqlx::query_as::<_, TemplateRow>(
                    r#"SELECT id, tenant_id, name, channel, subject, body, variables, active
                       FROM templates WHERE tenant_id = $1 AND channel = $2 ORDER BY name ASC"#,
                )
                .bind(tenant_id)
                .bind(channel.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TemplateRow>(
                    r#"SELECT id, tenant_id, name, channel, subject, body, variables, active
                       FROM templates WHERE tenant_id = $1 ORDER BY name ASC"#,
                )
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn update_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        input: UpdateTemplate,
    ) -> StoreResult<Template> {
        let variables_json = input
            .variables
            .map(|v| serde_json::to_value(&v))
            .transpose()
            .map_err(|e| StoreError::Internal(e.into()))?;

        let row = sqlx::query_as::<_, TemplateRow>(
            r#"UPDATE templates SET
                   name = COALESCE($3, name),
                   subject = CASE WHEN $4 THEN $5 ELSE subject END,
                   body = COALESCE($6, body),
                   variables = COALESCE($7, variables),
                   active = COALESCE($8, active)
               WHERE id = $1 AND tenant_id = $2
               RETURNING id, tenant_id, name, channel, subject, body, variables, active"#,
        )
        .bind(template_id)
        .bind(tenant_id)
        .bind(&input.name)
        .bind(input.subject.is_some())
        .bind(input.subject.flatten())
        .bind(&input.body)
        .bind(&variables_json)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StoreError::NotFound(format!("template {template_id}")))?;

        Ok(row.into())
    }

    async fn delete_template(&self, tenant_id: Uuid, template_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1 AND tenant_id = $2")
            .bind(template_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("template {template_id}"))
    }

    // -- scheduled job queue (spec §4.5) ----------------------------------

    async fn create_scheduled_job(&self, input: NewScheduledJob) -> StoreResult<ScheduledJob> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, ScheduledJobRow>(
            r#"INSERT INTO scheduled_jobs (id, tenant_id, trigger_id, entity_type, entity_id, scheduled_for)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, tenant_id, trigger_id, entity_type, entity_id, scheduled_for, status,
                         attempts, last_error, created_at, processed_at"#,
        )
        .bind(id)
        .bind(input.tenant_id)
        .bind(input.trigger_id)
        .bind(input.entity_type.to_string())
        .bind(input.entity_id)
        .bind(input.scheduled_for)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    async fn cancel_pending(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"UPDATE scheduled_jobs SET status = 'cancelled'
               WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3 AND status = 'pending'"#,
        )
        .bind(tenant_id)
        .bind(entity_type.to_string())
        .bind(entity_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    async fn list_due_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<ScheduledJob>> {
        let rows = sqlx::query_as::<_, ScheduledJobRow>(
            r#"SELECT id, tenant_id, trigger_id, entity_type, entity_id, scheduled_for, status,
                      attempts, last_error, created_at, processed_at
               FROM scheduled_jobs
               WHERE status = 'pending' AND scheduled_for <= $1
               ORDER BY scheduled_for ASC
               LIMIT $2"#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(ScheduledJob::from).collect())
    }

    /// Atomic `pending -> processing` hand-off (spec §4.1, §8 property 6):
    /// a single `UPDATE ... WHERE status = 'pending'` is the whole
    /// concurrency guarantee, Postgres's row-level locking does the rest.
    async fn claim_job(&self, job_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"UPDATE scheduled_jobs SET status = 'processing', attempts = attempts + 1
               WHERE id = $1 AND status = 'pending'"#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_job(&self, job_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE scheduled_jobs SET status = 'completed', processed_at = now()
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("processing job {job_id}"))
    }

    async fn fail_job(&self, job_id: Uuid, error: String) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE scheduled_jobs SET status = 'failed', last_error = $2, processed_at = now()
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("processing job {job_id}"))
    }

    async fn requeue_job(&self, job_id: Uuid, error: String) -> StoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE scheduled_jobs SET status = 'pending', last_error = $2
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        require_affected(result.rows_affected(), || format!("processing job {job_id}"))
    }

    async fn cleanup_old_jobs(&self, older_than: Duration) -> StoreResult<u64> {
        let cutoff = Utc::now() - older_than;
        let result = sqlx::query(
            r#"DELETE FROM scheduled_jobs
               WHERE status IN ('completed', 'cancelled', 'failed') AND created_at < $1"#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    // -- execution log (spec §4.6) ----------------------------------------

    async fn append_log(&self, entry: NewExecutionLogEntry) -> StoreResult<ExecutionLogEntry> {
        let id = Uuid::now_v7();
        let row = sqlx::query_as::<_, ExecutionLogEntryRow>(
            r#"INSERT INTO workflow_execution_log
                   (id, tenant_id, workflow_id, entity_type, entity_id, trigger_id, action_id,
                    event_type, from_state, to_state, details)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING id, tenant_id, workflow_id, entity_type, entity_id, trigger_id, action_id,
                         event_type, from_state, to_state, details, created_at"#,
        )
        .bind(id)
        .bind(entry.tenant_id)
        .bind(entry.workflow_id)
        .bind(entry.entity_type.to_string())
        .bind(entry.entity_id)
        .bind(entry.trigger_id)
        .bind(entry.action_id)
        .bind(entry.event_type.to_string())
        .bind(&entry.from_state)
        .bind(&entry.to_state)
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.into())
    }

    // -- action sinks ------------------------------------------------------

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
        let table = match entity_type {
            EntityType::Session => "sessions",
            EntityType::Budget => "budgets",
            EntityType::Project => "projects",
        };
        // `field` is validated against the allow-list above before it ever
        // reaches the query string; it never carries caller-controlled text.
        let sql = format!("UPDATE {table} SET {field} = $3 WHERE id = $1 AND tenant_id = $2");
        let query = sqlx::query(&sql).bind(entity_id).bind(tenant_id);
        let result = match value {
            DataValue::Text(s) => query.bind(s),
            DataValue::Number(n) => query.bind(n),
            DataValue::Bool(b) => query.bind(b),
            DataValue::Timestamp(t) => query.bind(t),
        }
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        require_affected(result.rows_affected(), || format!("{entity_type} {entity_id}"))
    }

    async fn record_task(&self, tenant_id: Uuid, input: NewTaskRecord) -> StoreResult<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO tasks (id, tenant_id, entity_type, entity_id, title, description, assignee)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(input.entity_type.to_string())
        .bind(input.entity_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.assignee)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(id)
    }
}

impl Database {
    /// `list_active_recurring_triggers` needs a trigger row joined with its
    /// owning workflow row; sqlx's ad-hoc `query_as` decoding has no clean
    /// way to split one result set back into two distinct row structs, so
    /// this loads both sets separately and joins them in memory.
    async fn list_active_recurring_triggers_fallback(&self) -> StoreResult<Vec<(Trigger, Workflow)>> {
        let trigger_rows = sqlx::query_as::<_, TriggerRow>(
            r#"SELECT id, workflow_id, state_id, transition_id, trigger_type, time_offset_minutes,
                      time_field, recurring_cron, conditions, active
               FROM workflow_triggers WHERE trigger_type = 'recurring' AND active"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let workflow_ids: Vec<Uuid> = trigger_rows.iter().map(|t| t.workflow_id).collect();
        if workflow_ids.is_empty() {
            return Ok(Vec::new());
        }

        let workflow_rows = sqlx::query_as::<_, WorkflowRow>(
            r#"SELECT id, tenant_id, name, description, module, entity_type, active, is_default, created_at, updated_at
               FROM workflows WHERE id = ANY($1) AND active"#,
        )
        .bind(&workflow_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut out = Vec::new();
        for trigger_row in trigger_rows {
            if let Some(workflow_row) = workflow_rows.iter().find(|w| w.id == trigger_row.workflow_id) {
                out.push((trigger_row.into(), workflow_row.clone().into()));
            }
        }
        Ok(out)
    }
}

fn require_affected<F: FnOnce() -> String>(rows_affected: u64, not_found: F) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound(not_found()))
    } else {
        Ok(())
    }
}

/// Map a raw sqlx error onto the Store's taxonomy (spec §4.1): uniqueness
/// and FK violations are distinguishable constraint kinds, everything else
/// is `Internal` (and therefore `TransientStore` once converted to
/// `EngineError`, per spec §7).
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKey(db_err.message().to_string());
        }
    }
    StoreError::Internal(err.into())
}
