//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::OrderStore;
use serde::Serialize;
use workflow::ExecutionStore;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_workflows: usize,
}

/// GET /health: returns system health status.
pub async fn check<S, E>(State(state): State<Arc<AppState<S, E>>>) -> Json<HealthResponse>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    Json(HealthResponse {
        status: "ok",
        active_workflows: state.supervisor.active_count(),
    })
}
