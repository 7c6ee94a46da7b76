// `SchedulerPort` implementation plus the sweep ticker that turns due
// `ScheduledJob` rows into queued tasks (spec §4.5 points 1-3).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use workflow_engine_contracts::{
    EntityType, LogEventType, NewExecutionLogEntry, NewScheduledJob, TaskPayload, TriggerType,
    TriggerWithActions,
};
use workflow_engine_core::data::DataMap;
use workflow_engine_core::error::Result;
use workflow_engine_core::traits::{append_log_soft, SchedulerPort, Store, TaskQueuePort};

use crate::config::SchedulerConfig;

/// The Engine-facing half of spec §4.5: computes an absolute `scheduled_for`
/// for each time-based trigger on state entry/transition and persists it as
/// a `ScheduledJob` row.
pub struct Scheduler {
    store: Arc<dyn Store>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SchedulerPort for Scheduler {
    async fn schedule_for_state(
        &self,
        tenant_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
        triggers: &[TriggerWithActions],
        data: &DataMap,
    ) -> Result<()> {
        for trigger in triggers {
            let t = &trigger.trigger;
            if !matches!(t.trigger_type, TriggerType::TimeBefore | TriggerType::TimeAfter) {
                continue;
            }
            let Some(offset_minutes) = t.time_offset_minutes else {
                tracing::warn!(trigger_id = %t.id, "time-based trigger missing time_offset_minutes, skipping");
                continue;
            };

            let field = t.time_field_or_default();
            let Some(base_time) = data.get(field).and_then(|v| v.as_timestamp()) else {
                tracing::warn!(trigger_id = %t.id, %field, "entity has no resolvable time field, skipping schedule");
                continue;
            };

            // time_before always fires at base_time minus the offset's
            // magnitude; time_after adds the (signed) offset (spec §4.5
            // point 1). `time_offset_minutes` itself may be stored positive
            // or negative for time_before — only the magnitude matters.
            let scheduled_for = match t.trigger_type {
                TriggerType::TimeBefore => base_time - Duration::minutes(offset_minutes.unsigned_abs() as i64),
                TriggerType::TimeAfter => base_time + Duration::minutes(offset_minutes as i64),
                _ => unreachable!("filtered to time-based triggers above"),
            };

            if scheduled_for < Utc::now() {
                tracing::debug!(trigger_id = %t.id, "computed firing time is in the past, skipping");
                continue;
            }

            self.store
                .create_scheduled_job(NewScheduledJob {
                    tenant_id,
                    trigger_id: t.id,
                    entity_type,
                    entity_id,
                    scheduled_for,
                })
                .await?;
        }
        Ok(())
    }

    async fn cancel_pending(&self, tenant_id: Uuid, entity_type: EntityType, entity_id: Uuid) -> Result<()> {
        self.store.cancel_pending(tenant_id, entity_type, entity_id).await?;
        Ok(())
    }
}

/// Periodically scans `scheduled_jobs` for due rows, claims each one, and
/// hands it to the `TaskQueuePort` (spec §4.5 point 3). Runs as a background
/// tokio task; one claim failure (lost race to another sweeper instance)
/// is silently skipped, not an error.
pub struct SweepTicker {
    store: Arc<dyn Store>,
    queue: Arc<dyn TaskQueuePort>,
    interval: StdDuration,
    batch_size: i64,
    max_attempts: i32,
}

impl SweepTicker {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn TaskQueuePort>) -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            store,
            queue,
            interval: defaults.sweep_interval,
            batch_size: defaults.batch_size,
            max_attempts: defaults.max_attempts,
        }
    }

    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Apply every spec §6 `scheduler.*` option from a single config value.
    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        self.with_interval(config.sweep_interval)
            .with_batch_size(config.batch_size)
            .with_max_attempts(config.max_attempts)
    }

    /// Runs until the process exits. Intended to be spawned with
    /// `tokio::spawn`, mirroring the teacher's pattern of a background task
    /// holding onto its own `Arc`-shared dependencies.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep_once().await {
                tracing::warn!(error = %err, "scheduled job sweep failed");
            }
        }
    }

    async fn sweep_once(&self) -> Result<()> {
        let due = self.store.list_due_pending(Utc::now(), self.batch_size).await?;
        for job in due {
            let claimed = self.store.claim_job(job.id).await?;
            if !claimed {
                continue;
            }
            let attempt = job.attempts + 1;
            let payload = TaskPayload {
                tenant_id: job.tenant_id,
                trigger_id: job.trigger_id,
                entity_type: job.entity_type,
                entity_id: job.entity_id,
            };
            let idempotency_key = format!("job:{}:{attempt}", job.id);

            match self.queue.enqueue_task(payload, &idempotency_key).await {
                // spec §4.5 point 3c: "On successful enqueue, transition
                // the row to completed" — the Scheduler's job is done once
                // the firing has been handed off; the dispatch worker no
                // longer needs to reconcile this row's status.
                Ok(()) => {
                    if let Err(err) = self.store.complete_job(job.id).await {
                        tracing::warn!(job_id = %job.id, error = %err, "failed to mark scheduled job completed after enqueue");
                    }
                }
                Err(err) => {
                    tracing::warn!(job_id = %job.id, error = %err, "enqueue failed after claim");
                    if attempt >= self.max_attempts {
                        let _ = self.store.fail_job(job.id, err.to_string()).await;
                        self.log_exhausted_job(&job, &err.to_string()).await;
                    } else {
                        let _ = self.store.requeue_job(job.id, err.to_string()).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// On attempt exhaustion the row is `failed`, but the audit trail still
    /// needs an `action_failed` entry (spec §4.5 failure model). A
    /// `ScheduledJob` row doesn't carry `workflow_id`, so resolve it via the
    /// trigger first; if that lookup itself fails (e.g. trigger deleted),
    /// warn and move on rather than fail the whole sweep over one job.
    async fn log_exhausted_job(&self, job: &workflow_engine_contracts::ScheduledJob, error: &str) {
        match self.store.get_trigger_with_workflow(job.tenant_id, job.trigger_id).await {
            Ok((_, _, workflow)) => {
                append_log_soft(
                    self.store.as_ref(),
                    NewExecutionLogEntry {
                        tenant_id: job.tenant_id,
                        workflow_id: workflow.id,
                        entity_type: job.entity_type,
                        entity_id: job.entity_id,
                        trigger_id: Some(job.trigger_id),
                        action_id: None,
                        event_type: LogEventType::ActionFailed,
                        from_state: None,
                        to_state: None,
                        details: json!({"error": error}),
                    },
                )
                .await;
            }
            Err(err) => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %err,
                    "could not resolve workflow for exhausted job, skipping action_failed log"
                );
            }
        }
    }
}

/// Periodically clears out terminal `scheduled_jobs` rows so the table does
/// not grow unbounded (spec §4.5: "CleanupOldJobs").
pub async fn run_cleanup_ticker(store: Arc<dyn Store>, interval: StdDuration, retain_for: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match store.cleanup_old_jobs(retain_for).await {
            Ok(count) if count > 0 => tracing::info!(count, "cleaned up old scheduled jobs"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "scheduled job cleanup failed"),
        }
    }
}
