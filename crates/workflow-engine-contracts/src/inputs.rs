// Create/update input shapes for the Store trait (spec §4.1). These are
// DB-agnostic so `workflow-engine-core::traits::Store` can name them without
// depending on the storage crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{ActionType, Channel, EntityType, Module, StateType, TriggerType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub module: Module,
    pub entity_type: EntityType,
    pub default: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewState {
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub state_type: StateType,
    pub color: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransition {
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub from_state: Uuid,
    pub to_state: Uuid,
    pub name: String,
    pub requires_confirmation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrigger {
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub state_id: Option<Uuid>,
    pub transition_id: Option<Uuid>,
    pub trigger_type: TriggerType,
    pub time_offset_minutes: Option<i32>,
    pub time_field: Option<String>,
    pub recurring_cron: Option<String>,
    pub conditions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAction {
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub action_type: ActionType,
    pub order: i32,
    pub template_id: Option<Uuid>,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub tenant_id: Uuid,
    pub name: String,
    pub channel: Channel,
    pub subject: Option<String>,
    pub body: String,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub subject: Option<Option<String>>,
    pub body: Option<String>,
    pub variables: Option<Vec<String>>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduledJob {
    pub tenant_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecutionLogEntry {
    pub tenant_id: Uuid,
    pub workflow_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub trigger_id: Option<Uuid>,
    pub action_id: Option<Uuid>,
    pub event_type: crate::enums::LogEventType,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub details: serde_json::Value,
}

impl NewExecutionLogEntry {
    pub fn state_change(
        tenant_id: Uuid,
        workflow_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        from_state: Option<String>,
        to_state: Option<String>,
    ) -> Self {
        Self {
            tenant_id,
            workflow_id,
            entity_type,
            entity_id,
            trigger_id: None,
            action_id: None,
            event_type: crate::enums::LogEventType::StateChange,
            from_state,
            to_state,
            details: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
}
