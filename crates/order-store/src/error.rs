use thiserror::Error;

use crate::OrderId;

/// Errors returned by an order store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderStoreError {
    /// No order is stored under this key.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// An order with this key already exists.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderId),

    /// The backend could not complete the request (timeouts, throttling,
    /// temporary outages). The write may or may not have been applied.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

impl OrderStoreError {
    /// Returns true if repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, OrderStoreError::Unavailable(_))
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
