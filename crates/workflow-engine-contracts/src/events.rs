// Inbound event payloads from spec §6. These are produced by the
// surrounding CRUD system (out of scope) when a domain entity changes
// state, and are the sole entry point into the Engine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::enums::EntityType;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnStateEnterEvent {
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub new_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hint: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnStateExitEvent {
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub old_state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnTransitionEvent {
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hint: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnEntityDeletedEvent {
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
}
