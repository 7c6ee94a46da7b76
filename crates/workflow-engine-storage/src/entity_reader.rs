// `DomainEntityReader` against the entity snapshot tables (spec §4.3
// SUPPLEMENT). Each fetch is a single join from the entity table out to its
// counterpart/organization columns; `workflow-engine-core::entity_data`
// turns the result into the flat `DataMap` the template renderer consumes.

use async_trait::async_trait;
use uuid::Uuid;

use workflow_engine_core::error::StoreResult;
use workflow_engine_core::traits::{BudgetSnapshot, DomainEntityReader, ProjectSnapshot, SessionSnapshot};

use crate::models::{BudgetJoinRow, ProjectJoinRow, SessionJoinRow};
use crate::Database;

#[async_trait]
impl DomainEntityReader for Database {
    async fn fetch_session(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<SessionSnapshot>> {
        let row = sqlx::query_as::<_, SessionJoinRow>(
            r#"SELECT p.name AS patient_name, p.phone AS patient_phone, p.email AS patient_email,
                      t.name AS therapist_name, s.session_type, s.amount::float8 AS amount,
                      s.organization_name, s.scheduled_at, s.created_at
               FROM sessions s
               JOIN patients p ON p.id = s.patient_id
               LEFT JOIN therapists t ON t.id = s.therapist_id
               WHERE s.id = $1 AND s.tenant_id = $2"#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| workflow_engine_core::error::StoreError::Internal(e.into()))?;

        Ok(row.map(|row| SessionSnapshot {
            patient_name: Some(row.patient_name),
            patient_phone: row.patient_phone,
            patient_email: row.patient_email,
            therapist_name: row.therapist_name,
            session_date: Some(row.scheduled_at.format("%Y-%m-%d").to_string()),
            session_time: Some(row.scheduled_at.format("%H:%M").to_string()),
            session_type: row.session_type,
            amount: row.amount,
            organization_name: row.organization_name,
            scheduled_at: row.scheduled_at,
            created_at: row.created_at,
        }))
    }

    async fn fetch_budget(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<BudgetSnapshot>> {
        let row = sqlx::query_as::<_, BudgetJoinRow>(
            r#"SELECT c.name AS client_name, c.email AS client_email, c.phone AS client_phone,
                      p.name AS project_name, b.total::float8 AS total, b.budget_link, b.approval_link,
                      p.organization_name, b.sent_at, b.created_at
               FROM budgets b
               JOIN projects p ON p.id = b.project_id
               JOIN clients c ON c.id = p.client_id
               WHERE b.id = $1 AND b.tenant_id = $2"#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| workflow_engine_core::error::StoreError::Internal(e.into()))?;

        Ok(row.map(|row| BudgetSnapshot {
            client_name: Some(row.client_name),
            client_email: row.client_email,
            client_phone: row.client_phone,
            project_name: Some(row.project_name),
            budget_total: row.total,
            budget_link: row.budget_link,
            approval_link: row.approval_link,
            organization_name: row.organization_name,
            sent_at: row.sent_at,
            created_at: row.created_at,
        }))
    }

    async fn fetch_project(&self, tenant_id: Uuid, entity_id: Uuid) -> StoreResult<Option<ProjectSnapshot>> {
        let row = sqlx::query_as::<_, ProjectJoinRow>(
            r#"SELECT c.name AS client_name, c.email AS client_email, c.phone AS client_phone,
                      p.name, p.status, p.organization_name, p.created_at
               FROM projects p
               JOIN clients c ON c.id = p.client_id
               WHERE p.id = $1 AND p.tenant_id = $2"#,
        )
        .bind(entity_id)
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| workflow_engine_core::error::StoreError::Internal(e.into()))?;

        Ok(row.map(|row| ProjectSnapshot {
            client_name: Some(row.client_name),
            client_email: row.client_email,
            client_phone: row.client_phone,
            project_name: Some(row.name),
            project_status: Some(row.status),
            organization_name: row.organization_name,
            created_at: row.created_at,
        }))
    }
}
