// The per-entity-type variable catalogue (spec §4.2) and the update_field
// allow-list (spec §4.4). Both describe "what's visible/mutable per entity
// type", so they live in one module. This is process-wide immutable
// configuration (spec §5, §9 "Global state") — inject it at construction
// rather than reaching for it as a module-level global, so tests stay
// hermetic.

use workflow_engine_contracts::EntityType;

/// Declared template variables per entity type (spec §4.2).
pub fn variable_catalogue(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Session => &[
            "patient_name",
            "patient_phone",
            "patient_email",
            "therapist_name",
            "session_date",
            "session_time",
            "session_type",
            "amount",
            "organization_name",
        ],
        EntityType::Budget => &[
            "client_name",
            "client_email",
            "client_phone",
            "project_name",
            "budget_total",
            "budget_link",
            "approval_link",
            "organization_name",
        ],
        EntityType::Project => &[
            "client_name",
            "client_email",
            "client_phone",
            "project_name",
            "project_status",
            "organization_name",
        ],
    }
}

/// Columns `update_field` is allowed to write per entity type (spec §4.4:
/// "a parameterised statement restricted to a per-entity-type allow-list of
/// column names; unknown fields are rejected").
pub fn update_field_allow_list(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Session => &["status", "confirmed_at", "notes"],
        EntityType::Budget => &["status", "approved_at", "sent_at", "notes"],
        EntityType::Project => &["status", "notes"],
    }
}

pub fn is_known_variable(entity_type: EntityType, name: &str) -> bool {
    variable_catalogue(entity_type).contains(&name)
}

pub fn is_allowed_field(entity_type: EntityType, field: &str) -> bool {
    update_field_allow_list(entity_type).contains(&field)
}

/// A canned sample data map per entity type, used by `Preview` (spec §4.2)
/// so administration tooling can render a template without a live entity.
pub fn sample_data(entity_type: EntityType) -> crate::data::DataMap {
    use crate::data::DataValue;

    let mut data = crate::data::DataMap::new();
    let pairs: &[(&str, &str)] = match entity_type {
        EntityType::Session => &[
            ("patient_name", "Ana Sousa"),
            ("patient_phone", "+351912000000"),
            ("patient_email", "ana.sousa@example.com"),
            ("therapist_name", "Dr. João Pinto"),
            ("session_date", "2026-08-03"),
            ("session_time", "10:00"),
            ("session_type", "Fisioterapia"),
            ("amount", "45"),
            ("organization_name", "Clínica Exemplo"),
        ],
        EntityType::Budget => &[
            ("client_name", "Construtora Lda"),
            ("client_email", "geral@construtora.example"),
            ("client_phone", "+351213000000"),
            ("project_name", "Remodelação Cozinha"),
            ("budget_total", "15000.00"),
            ("budget_link", "https://app.example/budgets/preview"),
            ("approval_link", "https://app.example/budgets/preview/approve"),
            ("organization_name", "Obras Exemplo"),
        ],
        EntityType::Project => &[
            ("client_name", "Construtora Lda"),
            ("client_email", "geral@construtora.example"),
            ("client_phone", "+351213000000"),
            ("project_name", "Remodelação Cozinha"),
            ("project_status", "em curso"),
            ("organization_name", "Obras Exemplo"),
        ],
    };
    for (k, v) in pairs {
        data.insert((*k).to_string(), DataValue::Text((*v).to_string()));
    }
    data
}
