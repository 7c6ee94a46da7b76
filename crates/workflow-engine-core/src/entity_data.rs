// Entity Data Provider (spec §4.3): resolves `(tenant, entity_type,
// entity_id)` into the flat variable map the Template Renderer consumes.
// The actual joins are behind `DomainEntityReader`; this module only
// knows how to flatten one snapshot into a `DataMap`.

use std::sync::Arc;
use uuid::Uuid;
use workflow_engine_contracts::EntityType;

use crate::data::{DataMap, DataValue};
use crate::error::{EngineError, Result};
use crate::traits::{BudgetSnapshot, DomainEntityReader, ProjectSnapshot, SessionSnapshot};

/// The variable map key the Scheduler falls back to when a Trigger's
/// `time_field` names no attribute present on the entity (spec §3 Trigger:
/// "defaults to `created_at`").
pub const CREATED_AT_KEY: &str = "created_at";

pub struct EntityDataProvider {
    reader: Arc<dyn DomainEntityReader>,
}

impl EntityDataProvider {
    pub fn new(reader: Arc<dyn DomainEntityReader>) -> Self {
        Self { reader }
    }

    /// Resolve one entity into its flat variable map. A field absent on
    /// the entity is omitted from the map, never inserted as an empty
    /// string (spec §4.3): downstream code must be able to tell "missing"
    /// from "empty".
    pub async fn fetch(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<DataMap> {
        match entity_type {
            EntityType::Session => {
                let snapshot = self
                    .reader
                    .fetch_session(tenant_id, entity_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("session {entity_id}")))?;
                Ok(session_to_map(snapshot))
            }
            EntityType::Budget => {
                let snapshot = self
                    .reader
                    .fetch_budget(tenant_id, entity_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("budget {entity_id}")))?;
                Ok(budget_to_map(snapshot))
            }
            EntityType::Project => {
                let snapshot = self
                    .reader
                    .fetch_project(tenant_id, entity_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("project {entity_id}")))?;
                Ok(project_to_map(snapshot))
            }
        }
    }
}

fn insert_opt_text(map: &mut DataMap, key: &str, value: Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), DataValue::Text(value));
    }
}

fn insert_opt_number(map: &mut DataMap, key: &str, value: Option<f64>) {
    if let Some(value) = value {
        map.insert(key.to_string(), DataValue::Number(value));
    }
}

fn session_to_map(s: SessionSnapshot) -> DataMap {
    let mut map = DataMap::new();
    insert_opt_text(&mut map, "patient_name", s.patient_name);
    insert_opt_text(&mut map, "patient_phone", s.patient_phone);
    insert_opt_text(&mut map, "patient_email", s.patient_email);
    insert_opt_text(&mut map, "therapist_name", s.therapist_name);
    insert_opt_text(&mut map, "session_date", s.session_date);
    insert_opt_text(&mut map, "session_time", s.session_time);
    insert_opt_text(&mut map, "session_type", s.session_type);
    insert_opt_number(&mut map, "amount", s.amount);
    insert_opt_text(&mut map, "organization_name", s.organization_name);
    map.insert("scheduled_at".to_string(), DataValue::Timestamp(s.scheduled_at));
    map.insert(CREATED_AT_KEY.to_string(), DataValue::Timestamp(s.created_at));
    map
}

fn budget_to_map(b: BudgetSnapshot) -> DataMap {
    let mut map = DataMap::new();
    insert_opt_text(&mut map, "client_name", b.client_name);
    insert_opt_text(&mut map, "client_email", b.client_email);
    insert_opt_text(&mut map, "client_phone", b.client_phone);
    insert_opt_text(&mut map, "project_name", b.project_name);
    // budget_total is currency; pre-format to two decimals here since
    // DataValue::Number renders without locale/decimal formatting (spec §4.2).
    insert_opt_text(&mut map, "budget_total", b.budget_total.map(|v| format!("{v:.2}")));
    insert_opt_text(&mut map, "budget_link", b.budget_link);
    insert_opt_text(&mut map, "approval_link", b.approval_link);
    insert_opt_text(&mut map, "organization_name", b.organization_name);
    if let Some(sent_at) = b.sent_at {
        map.insert("sent_at".to_string(), DataValue::Timestamp(sent_at));
    }
    map.insert(CREATED_AT_KEY.to_string(), DataValue::Timestamp(b.created_at));
    map
}

fn project_to_map(p: ProjectSnapshot) -> DataMap {
    let mut map = DataMap::new();
    insert_opt_text(&mut map, "client_name", p.client_name);
    insert_opt_text(&mut map, "client_email", p.client_email);
    insert_opt_text(&mut map, "client_phone", p.client_phone);
    insert_opt_text(&mut map, "project_name", p.project_name);
    insert_opt_text(&mut map, "project_status", p.project_status);
    insert_opt_text(&mut map, "organization_name", p.organization_name);
    map.insert(CREATED_AT_KEY.to_string(), DataValue::Timestamp(p.created_at));
    map
}
