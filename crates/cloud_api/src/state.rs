use std::sync::Arc;

use db::DbPool;

use crate::pipeline::orchestrator::Orchestrator;

/// Shared app state for Axum handlers. DB is optional so the server can start and answer health checks when MySQL is not running.
#[derive(Clone)]
pub struct AppState {
    pub db: Option<DbPool>,
    pub orchestrator: Arc<Orchestrator>,
}
