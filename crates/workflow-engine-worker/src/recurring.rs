// Recurring-trigger sweep (spec §4.5 point 3, §9 Open Question 1): recurring
// triggers are never materialised as `scheduled_jobs` rows. Each tick
// re-scans active `recurring` triggers and enqueues the ones whose cron
// expression matches the current UTC minute, deduplicated in-memory so two
// sweeps inside the same minute fire a trigger at most once (spec §8
// property 7).
//
// A `recurring` trigger has no single entity to run against — it is scoped
// to a state, not an instance — so it is dispatched with a nil entity id and
// the Entity Data Provider's best-effort fallback naturally degrades to an
// empty data map (see DESIGN.md for the reasoning).

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tokio::sync::Mutex;
use uuid::Uuid;
use workflow_engine_contracts::TaskPayload;
use workflow_engine_core::traits::{Store, TaskQueuePort};

/// Sentinel entity id a recurring trigger fires against, since it has no
/// single owning entity instance.
pub const RECURRING_ENTITY_ID: Uuid = Uuid::nil();

pub struct RecurringSweeper {
    store: Arc<dyn Store>,
    queue: Arc<dyn TaskQueuePort>,
    interval: StdDuration,
    seen: Mutex<HashSet<(Uuid, i64)>>,
}

impl RecurringSweeper {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn TaskQueuePort>) -> Self {
        Self {
            store,
            queue,
            interval: StdDuration::from_secs(15),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_interval(mut self, interval: StdDuration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.sweep_once(Utc::now()).await {
                tracing::warn!(error = %err, "recurring trigger sweep failed");
            }
        }
    }

    async fn sweep_once(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let minute = now.with_second_zero();
        let minute_key = minute.timestamp() / 60;

        let triggers = self.store.list_active_recurring_triggers().await?;
        for (trigger, workflow) in triggers {
            let Some(cron_expr) = trigger.recurring_cron.as_deref() else {
                tracing::warn!(trigger_id = %trigger.id, "recurring trigger missing recurring_cron, skipping");
                continue;
            };
            let normalized = normalize_cron(cron_expr);
            let schedule = match Schedule::from_str(&normalized) {
                Ok(schedule) => schedule,
                Err(err) => {
                    tracing::warn!(trigger_id = %trigger.id, %cron_expr, error = %err, "invalid recurring_cron, skipping");
                    continue;
                }
            };
            if !schedule.includes(minute) {
                continue;
            }

            let dedup_key = (trigger.id, minute_key);
            {
                let mut seen = self.seen.lock().await;
                if !seen.insert(dedup_key) {
                    continue;
                }
                prune_old_entries(&mut seen, minute_key);
            }

            let payload = TaskPayload {
                tenant_id: workflow.tenant_id,
                trigger_id: trigger.id,
                entity_type: workflow.entity_type,
                entity_id: RECURRING_ENTITY_ID,
            };
            let idempotency_key = format!("recurring:{}:{minute_key}", trigger.id);
            if let Err(err) = self.queue.enqueue_task(payload, &idempotency_key).await {
                tracing::warn!(trigger_id = %trigger.id, error = %err, "failed to enqueue recurring trigger firing");
            }
        }
        Ok(())
    }
}

/// Keeps the dedup set from growing without bound across a long-running
/// process: entries older than an hour can never be re-matched since
/// `minute_key` only ever increases.
fn prune_old_entries(seen: &mut HashSet<(Uuid, i64)>, current_minute: i64) {
    seen.retain(|(_, minute)| current_minute - minute < 60);
}

/// The `cron` crate requires a 6-7 field, seconds-leading expression;
/// spec §1 assumes a standard 5-field cron (minute hour day-of-month month
/// day-of-week). Prepend a `0` seconds field so a 5-field expression
/// parses the way the spec intends. Expressions that already carry a
/// seconds field are passed through unchanged.
fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

trait WithSecondZero {
    fn with_second_zero(self) -> Self;
}

impl WithSecondZero for DateTime<Utc> {
    fn with_second_zero(self) -> Self {
        self - Duration::seconds(self.timestamp() % 60)
    }
}
