// Database row shapes (internal) and their conversion into the public DTOs
// from `workflow_engine_contracts` (spec §3). Enum columns round-trip as
// TEXT through `Display`/`FromStr`; a row that fails to parse is a data
// corruption bug, not a recoverable runtime condition, so conversion panics
// via `expect` the way a `CHECK` constraint violation would.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use workflow_engine_contracts::{
    Action, ActionType, Channel, EntityType, ExecutionLogEntry, JobStatus, LogEventType, Module,
    ScheduledJob, State, StateType, Template, Transition, Trigger, TriggerType, Workflow,
};

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub module: String,
    pub entity_type: String,
    pub active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WorkflowRow> for Workflow {
    fn from(row: WorkflowRow) -> Self {
        Workflow {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            module: Module::from_str(&row.module).expect("valid module in workflows.module"),
            entity_type: EntityType::from_str(&row.entity_type).expect("valid entity_type in workflows.entity_type"),
            active: row.active,
            default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StateRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub state_type: String,
    pub color: Option<String>,
    pub position: i32,
}

impl From<StateRow> for State {
    fn from(row: StateRow) -> Self {
        State {
            id: row.id,
            workflow_id: row.workflow_id,
            name: row.name,
            display_name: row.display_name,
            state_type: StateType::from_str(&row.state_type).expect("valid state_type"),
            color: row.color,
            position: row.position,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransitionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub from_state: Uuid,
    pub to_state: Uuid,
    pub name: String,
    pub requires_confirmation: bool,
}

impl From<TransitionRow> for Transition {
    fn from(row: TransitionRow) -> Self {
        Transition {
            id: row.id,
            workflow_id: row.workflow_id,
            from_state: row.from_state,
            to_state: row.to_state,
            name: row.name,
            requires_confirmation: row.requires_confirmation,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TriggerRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub state_id: Option<Uuid>,
    pub transition_id: Option<Uuid>,
    pub trigger_type: String,
    pub time_offset_minutes: Option<i32>,
    pub time_field: Option<String>,
    pub recurring_cron: Option<String>,
    pub conditions: Option<serde_json::Value>,
    pub active: bool,
}

impl From<TriggerRow> for Trigger {
    fn from(row: TriggerRow) -> Self {
        Trigger {
            id: row.id,
            workflow_id: row.workflow_id,
            state_id: row.state_id,
            transition_id: row.transition_id,
            trigger_type: TriggerType::from_str(&row.trigger_type).expect("valid trigger_type"),
            time_offset_minutes: row.time_offset_minutes,
            time_field: row.time_field,
            recurring_cron: row.recurring_cron,
            conditions: row.conditions,
            active: row.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActionRow {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub action_type: String,
    pub order: i32,
    pub template_id: Option<Uuid>,
    pub config: serde_json::Value,
    pub active: bool,
}

impl From<ActionRow> for Action {
    fn from(row: ActionRow) -> Self {
        Action {
            id: row.id,
            trigger_id: row.trigger_id,
            action_type: ActionType::from_str(&row.action_type).expect("valid action_type"),
            order: row.order,
            template_id: row.template_id,
            config: row.config,
            active: row.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub channel: String,
    pub subject: Option<String>,
    pub body: String,
    pub variables: serde_json::Value,
    pub active: bool,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            channel: Channel::from_str(&row.channel).expect("valid channel"),
            subject: row.subject,
            body: row.body,
            variables: serde_json::from_value(row.variables).unwrap_or_default(),
            active: row.active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduledJobRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<ScheduledJobRow> for ScheduledJob {
    fn from(row: ScheduledJobRow) -> Self {
        ScheduledJob {
            id: row.id,
            tenant_id: row.tenant_id,
            trigger_id: row.trigger_id,
            entity_type: EntityType::from_str(&row.entity_type).expect("valid entity_type"),
            entity_id: row.entity_id,
            scheduled_for: row.scheduled_for,
            status: JobStatus::from_str(&row.status).expect("valid job status"),
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExecutionLogEntryRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub trigger_id: Option<Uuid>,
    pub action_id: Option<Uuid>,
    pub event_type: String,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ExecutionLogEntryRow> for ExecutionLogEntry {
    fn from(row: ExecutionLogEntryRow) -> Self {
        ExecutionLogEntry {
            id: row.id,
            tenant_id: row.tenant_id,
            workflow_id: row.workflow_id,
            entity_type: EntityType::from_str(&row.entity_type).expect("valid entity_type"),
            entity_id: row.entity_id,
            trigger_id: row.trigger_id,
            action_id: row.action_id,
            event_type: LogEventType::from_str(&row.event_type).expect("valid event_type"),
            from_state: row.from_state,
            to_state: row.to_state,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

// -- entity snapshot rows (spec §4.3 SUPPLEMENT) -----------------------------

#[derive(Debug, Clone, FromRow)]
pub struct SessionJoinRow {
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub therapist_name: Option<String>,
    pub session_type: Option<String>,
    pub amount: Option<f64>,
    pub organization_name: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BudgetJoinRow {
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub project_name: String,
    pub total: Option<f64>,
    pub budget_link: Option<String>,
    pub approval_link: Option<String>,
    pub organization_name: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProjectJoinRow {
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub name: String,
    pub status: String,
    pub organization_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
