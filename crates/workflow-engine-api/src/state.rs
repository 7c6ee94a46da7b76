use std::sync::Arc;

use workflow_engine_core::engine::Engine;
use workflow_engine_core::traits::Store;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn Store>,
}
