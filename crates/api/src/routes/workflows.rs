//! Workflow trigger and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use common::OrderId;
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use workflow::{ExecutionStore, StepResult, WorkflowExecution, WorkflowStatus};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProcessParams {
    /// Block until the workflow reaches a terminal status.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Serialize)]
pub struct ProcessAcceptedResponse {
    pub execution_id: String,
    pub order_id: String,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct WorkflowResponse {
    pub execution_id: String,
    pub order_id: String,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub current_step: String,
    pub current_step_index: usize,
    pub retry_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub step_results: Vec<StepResult>,
    pub compensated_steps: Vec<String>,
}

impl From<&WorkflowExecution> for WorkflowResponse {
    fn from(execution: &WorkflowExecution) -> Self {
        Self {
            execution_id: execution.id().to_string(),
            order_id: execution.order_id().to_string(),
            workflow_type: execution.workflow_type().to_string(),
            status: execution.status(),
            current_step: execution.current_step().to_string(),
            current_step_index: execution.current_step_index(),
            retry_count: execution.retry_count(),
            started_at: execution.started_at(),
            completed_at: execution.completed_at(),
            next_retry_at: execution.next_retry_at(),
            error_message: execution.error_message().map(str::to_string),
            step_results: execution.step_results().to_vec(),
            compensated_steps: execution.compensated_steps().to_vec(),
        }
    }
}

/// POST /orders/{id}/process: start fulfillment for an existing order.
///
/// Answers 202 right after admission, or 200 with the finished execution
/// when `?wait=true`.
#[tracing::instrument(skip(state))]
pub async fn process<S, E>(
    State(state): State<Arc<AppState<S, E>>>,
    Path(id): Path<String>,
    Query(params): Query<ProcessParams>,
) -> Result<Response, ApiError>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let order_id = OrderId::new(id);
    // Unknown orders are a 404 here rather than a failed execution.
    state.orders.get_order(&order_id).await?;

    if params.wait {
        let execution = state.supervisor.start_workflow_and_wait(order_id).await?;
        return Ok((StatusCode::OK, Json(WorkflowResponse::from(&execution))).into_response());
    }

    let ack = state.supervisor.start_workflow(order_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessAcceptedResponse {
            execution_id: ack.execution_id.to_string(),
            order_id: ack.order_id.to_string(),
            status: "accepted",
        }),
    )
        .into_response())
}

/// GET /orders/{id}/workflow: latest execution for the order.
#[tracing::instrument(skip(state))]
pub async fn status<S, E>(
    State(state): State<Arc<AppState<S, E>>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let execution = state.supervisor.status(&OrderId::new(id)).await?;
    Ok(Json(WorkflowResponse::from(&execution)))
}

/// GET /orders/{id}/workflow/history: every execution, oldest first.
#[tracing::instrument(skip(state))]
pub async fn history<S, E>(
    State(state): State<Arc<AppState<S, E>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkflowResponse>>, ApiError>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    let executions = state.supervisor.history(&OrderId::new(id)).await?;
    Ok(Json(executions.iter().map(WorkflowResponse::from).collect()))
}
