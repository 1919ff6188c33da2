//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use order_store::OrderStoreError;
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The order breaks a business rule.
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),
    /// Order store error.
    #[error(transparent)]
    Store(#[from] OrderStoreError),
    /// Workflow supervisor error.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidOrder(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) => match err {
                OrderStoreError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderStoreError::AlreadyExists(_) => StatusCode::CONFLICT,
                OrderStoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Workflow(err) => match err {
                WorkflowError::AlreadyRunning { .. } => StatusCode::CONFLICT,
                WorkflowError::InvalidOrderId => StatusCode::BAD_REQUEST,
                WorkflowError::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                WorkflowError::WorkerLost(_)
                | WorkflowError::InvalidRegistry(_)
                | WorkflowError::ExecutionStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        if let ApiError::Workflow(WorkflowError::AlreadyRunning { execution_id, .. }) = &self {
            body["execution_id"] = serde_json::json!(execution_id.to_string());
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ExecutionId, OrderId};

    #[test]
    fn test_status_mapping() {
        let conflict = ApiError::from(WorkflowError::AlreadyRunning {
            order_id: OrderId::new("O1"),
            execution_id: ExecutionId::new(),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        assert_eq!(
            ApiError::from(WorkflowError::ShuttingDown).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(OrderStoreError::NotFound(OrderId::new("O1"))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(OrderError::NoItems).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
