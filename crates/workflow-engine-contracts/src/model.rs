// Data-model DTOs from spec §3. These are the shapes the Store reads and
// writes; `workflow-engine-storage` maps its `sqlx::FromRow` rows onto them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::enums::{ActionType, Channel, EntityType, JobStatus, LogEventType, Module, StateType, TriggerType};

/// The root of a per-tenant configuration graph.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub module: Module,
    pub entity_type: EntityType,
    pub active: bool,
    pub default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single node of a Workflow's state machine.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct State {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub state_type: StateType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub position: i32,
}

/// A directed edge between two States of the same Workflow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transition {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub from_state: Uuid,
    pub to_state: Uuid,
    pub name: String,
    pub requires_confirmation: bool,
}

/// An event binding attached to either a State or a Transition.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Trigger {
    pub id: Uuid,
    pub workflow_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_id: Option<Uuid>,
    pub trigger_type: TriggerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_offset_minutes: Option<i32>,
    /// Datetime attribute of the entity the offset is relative to.
    /// Defaults to `created_at` when absent (spec §3 Trigger).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring_cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
    pub active: bool,
}

impl Trigger {
    pub fn time_field_or_default(&self) -> &str {
        self.time_field.as_deref().unwrap_or("created_at")
    }
}

/// An ordered effect a fired Trigger executes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Action {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub action_type: ActionType,
    pub order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub config: serde_json::Value,
    pub active: bool,
}

/// A Trigger together with its ordered Actions, as eagerly loaded by the
/// Store (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TriggerWithActions {
    #[serde(flatten)]
    pub trigger: Trigger,
    pub actions: Vec<Action>,
}

/// A full Workflow graph: the Workflow row plus its owned States,
/// Transitions and Triggers (with Actions), eagerly loaded in one Store
/// round-trip (spec §4.1, §5 "the complete trigger set is materialised in
/// one store round-trip up front").
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowGraph {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub triggers: Vec<TriggerWithActions>,
}

impl WorkflowGraph {
    pub fn state_by_name(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn state_by_id(&self, id: Uuid) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Triggers attached to a given state, active only.
    pub fn triggers_for_state(&self, state_id: Uuid) -> Vec<&TriggerWithActions> {
        self.triggers
            .iter()
            .filter(|t| t.trigger.active && t.trigger.state_id == Some(state_id))
            .collect()
    }

    /// Triggers attached to a given transition, active only.
    pub fn triggers_for_transition(&self, transition_id: Uuid) -> Vec<&TriggerWithActions> {
        self.triggers
            .iter()
            .filter(|t| t.trigger.active && t.trigger.transition_id == Some(transition_id))
            .collect()
    }

    pub fn transition_between(&self, from: Uuid, to: Uuid) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from_state == from && t.to_state == to)
    }
}

/// A parameterised message body (and optional subject).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Template {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<String>,
    pub active: bool,
}

/// A durable, single-shot future firing of one trigger against one entity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Payload carried by the `EnqueueTask` outbound port (spec §6): the tuple
/// a dispatch worker needs to look up and run one trigger firing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskPayload {
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
}

/// Append-only audit trail row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<Uuid>,
    pub event_type: LogEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_state: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
