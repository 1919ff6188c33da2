//! Workflow error types.

use std::time::Duration;

use common::{ExecutionId, OrderId};
use domain::OrderError;
use order_store::OrderStoreError;
use thiserror::Error;

/// Why a single step attempt failed.
///
/// [`StepError::is_retryable`] decides whether the engine schedules another
/// attempt or treats the failure as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A collaborator was unreachable or answered with a temporary error.
    #[error("{service} unavailable: {reason}")]
    Transient {
        service: &'static str,
        reason: String,
    },

    /// The attempt did not finish within the step timeout.
    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    /// The payment authority refused the charge.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// Not enough stock to reserve a line.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    /// The order breaks a business rule.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    /// The order record no longer exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Something an earlier step should have produced is missing.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The order store answered with a temporary error.
    #[error("Order store error: {0}")]
    Store(String),
}

impl StepError {
    /// Creates a transient error for the named collaborator.
    pub fn transient(service: &'static str, reason: impl Into<String>) -> Self {
        StepError::Transient {
            service,
            reason: reason.into(),
        }
    }

    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepError::Transient { .. } | StepError::Timeout(_) | StepError::Store(_)
        )
    }
}

impl From<OrderStoreError> for StepError {
    fn from(err: OrderStoreError) -> Self {
        match err {
            OrderStoreError::NotFound(id) => StepError::OrderNotFound(id),
            OrderStoreError::Unavailable(reason) => StepError::Store(reason),
            other => StepError::Precondition(other.to_string()),
        }
    }
}

/// Errors returned by the workflow supervisor and execution store.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Another execution for the same order is still in flight.
    #[error("Workflow already in progress for order {order_id} (execution {execution_id})")]
    AlreadyRunning {
        order_id: OrderId,
        execution_id: ExecutionId,
    },

    /// The order id is empty.
    #[error("Order id must not be empty")]
    InvalidOrderId,

    /// No execution has ever been recorded for the order.
    #[error("No workflow execution found for order {0}")]
    ExecutionNotFound(OrderId),

    /// The supervisor no longer accepts work.
    #[error("Workflow supervisor is shutting down")]
    ShuttingDown,

    /// The worker running the execution stopped without reporting back.
    #[error("Workflow worker for order {0} stopped before reporting a result")]
    WorkerLost(OrderId),

    /// The step registry is malformed.
    #[error("Invalid step registry: {0}")]
    InvalidRegistry(String),

    /// The execution store failed.
    #[error("Execution store error: {0}")]
    ExecutionStore(String),
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StepError::transient("payment", "connection reset").is_retryable());
        assert!(StepError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(StepError::Store("timeout".into()).is_retryable());

        assert!(!StepError::Declined("insufficient funds".into()).is_retryable());
        assert!(!StepError::InvalidOrder(OrderError::NoItems).is_retryable());
        assert!(!StepError::OrderNotFound(OrderId::new("O1")).is_retryable());
        assert!(
            !StepError::InsufficientStock {
                product_id: "P-1".into(),
                requested: 2,
                available: 1,
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_store_errors_map_to_step_errors() {
        let missing: StepError = OrderStoreError::NotFound(OrderId::new("O1")).into();
        assert_eq!(missing, StepError::OrderNotFound(OrderId::new("O1")));

        let flaky: StepError = OrderStoreError::Unavailable("busy".into()).into();
        assert!(flaky.is_retryable());
    }

    #[test]
    fn test_declined_message_carries_reason() {
        let err = StepError::Declined("insufficient funds".into());
        assert_eq!(err.to_string(), "Payment declined: insufficient funds");
    }
}
