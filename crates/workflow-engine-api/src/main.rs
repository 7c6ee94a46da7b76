// Workflow engine API server
// Decision: the dispatch worker and sweep tickers are a separate binary
// (`workflow-engine-worker`); this process only serves the four inbound
// event routes (spec §6). Administration of the workflow graph itself
// (Workflow/State/Transition/Trigger/Action/Template CRUD) is a plain Rust
// API on `Store` — spec.md's Non-goals name "admin console" and "HTTP
// routing" as excluded surfaces, so it is not exposed here; see DESIGN.md.

mod error;
mod events;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use workflow_engine_contracts::{OnEntityDeletedEvent, OnStateEnterEvent, OnStateExitEvent, OnTransitionEvent};
use workflow_engine_core::action_executor::ActionExecutor;
use workflow_engine_core::engine::Engine;
use workflow_engine_core::entity_data::EntityDataProvider;
use workflow_engine_core::traits::{DomainEntityReader, SchedulerPort, Store};
use workflow_engine_storage::Database;
use workflow_engine_worker::Scheduler;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        events::on_state_enter,
        events::on_state_exit,
        events::on_transition,
        events::on_entity_deleted,
    ),
    components(
        schemas(
            OnStateEnterEvent, OnStateExitEvent, OnTransitionEvent, OnEntityDeletedEvent,
        )
    ),
    tags(
        (name = "events", description = "Inbound domain event endpoints consumed by the surrounding system"),
    ),
    info(
        title = "Workflow Engine API",
        version = "0.1.0",
        description = "Configurable workflow engine for scheduling and messaging",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workflow_engine_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("workflow-engine-api starting...");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL environment variable required")?;
    let db = Database::from_url(&database_url)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;
    tracing::info!("connected to database");

    let store: Arc<dyn Store> = Arc::new(db.clone());
    let reader: Arc<dyn DomainEntityReader> = Arc::new(db.clone());

    // This process never dispatches scheduled jobs itself (that's
    // `workflow-engine-worker`'s job); it only needs a `SchedulerPort` so
    // the Engine can create/cancel jobs reacting to inbound events.
    let scheduler: Arc<dyn SchedulerPort> = Arc::new(Scheduler::new(store.clone()));
    let entity_data = EntityDataProvider::new(reader);
    let executor = ActionExecutor::new(store.clone(), None);
    let engine = Arc::new(Engine::new(store.clone(), entity_data, executor, scheduler));

    let state = AppState { engine, store };

    let app = Router::new()
        .route("/health", get(health))
        .merge(events::routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9100".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
