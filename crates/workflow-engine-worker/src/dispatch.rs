// Dispatch worker: consumes queued `DispatchItem`s and runs them through the
// Engine (spec §4.5, §9 Open Question on EnqueueTask-after-claim). The
// originating `ScheduledJob` row, if any, was already transitioned to
// `completed`/`failed`/`pending` by the Scheduler's sweep at enqueue time
// (spec §4.5 point 3c) — this worker only runs the trigger and logs the
// outcome, it does not reconcile job status.

use std::sync::Arc;

use tokio::sync::mpsc;
use workflow_engine_core::engine::Engine;

use crate::task_queue::{DispatchItem, DispatchOrigin};

pub struct DispatchWorker {
    engine: Arc<Engine>,
    receiver: mpsc::Receiver<DispatchItem>,
}

impl DispatchWorker {
    pub fn new(engine: Arc<Engine>, receiver: mpsc::Receiver<DispatchItem>) -> Self {
        Self { engine, receiver }
    }

    /// Runs until the channel's sender side is dropped. Intended to be
    /// spawned as its own tokio task; a single worker is enough for the
    /// in-process queue since `ClaimJob` is already the concurrency guard
    /// for anything backed by a `ScheduledJob` row.
    pub async fn run(mut self) {
        while let Some(item) = self.receiver.recv().await {
            self.handle(item).await;
        }
        tracing::info!("dispatch worker stopped: queue closed");
    }

    async fn handle(&self, item: DispatchItem) {
        let payload = &item.payload;
        let result = self
            .engine
            .execute_trigger_by_id(payload.tenant_id, payload.trigger_id, payload.entity_type, payload.entity_id)
            .await;

        if let Err(err) = result {
            match item.origin {
                DispatchOrigin::ScheduledJob { job_id, .. } => {
                    tracing::warn!(%job_id, trigger_id = %payload.trigger_id, error = %err, "trigger execution failed");
                }
                DispatchOrigin::Recurring => {
                    tracing::warn!(trigger_id = %payload.trigger_id, error = %err, "recurring trigger execution failed");
                }
            }
        }
    }
}
