// Scheduler and dispatch worker (spec §4.5): turns the configuration graph's
// time-based and recurring triggers into actual firings against
// `workflow-engine-core::Engine`.

pub mod config;
pub mod dispatch;
pub mod recurring;
pub mod scheduler;
pub mod task_queue;

pub use config::SchedulerConfig;
pub use dispatch::DispatchWorker;
pub use recurring::RecurringSweeper;
pub use scheduler::{Scheduler, SweepTicker};
pub use task_queue::InProcessTaskQueue;
