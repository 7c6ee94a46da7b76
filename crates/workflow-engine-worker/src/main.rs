use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workflow_engine_core::action_executor::ActionExecutor;
use workflow_engine_core::engine::Engine;
use workflow_engine_core::entity_data::EntityDataProvider;
use workflow_engine_storage::Database;
use workflow_engine_worker::{DispatchWorker, InProcessTaskQueue, RecurringSweeper, Scheduler, SchedulerConfig, SweepTicker};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workflow_engine_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("workflow-engine-worker starting...");

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL environment variable required");
    let db = Database::from_url(&database_url).await?;
    db.migrate().await?;
    tracing::info!("database connection established");

    let store: Arc<dyn workflow_engine_core::traits::Store> = Arc::new(db.clone());
    let reader: Arc<dyn workflow_engine_core::traits::DomainEntityReader> = Arc::new(db.clone());

    let (queue, receiver) = InProcessTaskQueue::channel(1024);
    let queue: Arc<dyn workflow_engine_core::traits::TaskQueuePort> = Arc::new(queue);

    let scheduler: Arc<dyn workflow_engine_core::traits::SchedulerPort> = Arc::new(Scheduler::new(store.clone()));
    let entity_data = EntityDataProvider::new(reader);
    let executor = ActionExecutor::new(store.clone(), None);
    let engine = Arc::new(Engine::new(store.clone(), entity_data, executor, scheduler));

    let scheduler_config = SchedulerConfig::from_env();

    let dispatch_worker = DispatchWorker::new(engine, receiver);
    tokio::spawn(dispatch_worker.run());

    let sweep_ticker = SweepTicker::new(store.clone(), queue.clone()).with_config(&scheduler_config);
    tokio::spawn(sweep_ticker.run());

    let recurring_sweeper = Arc::new(RecurringSweeper::new(store.clone(), queue).with_interval(Duration::from_secs(15)));
    tokio::spawn(recurring_sweeper.run());

    tokio::spawn(workflow_engine_worker::scheduler::run_cleanup_ticker(
        store,
        scheduler_config.cleanup_interval,
        scheduler_config.cleanup_after,
    ));

    tracing::info!("scheduler, sweep ticker, recurring sweeper and dispatch worker running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    Ok(())
}
