//! Order and payment status lifecycles.

use serde::{Deserialize, Serialize};

/// The fulfillment status of an order.
///
/// Typical progression:
/// ```text
/// Pending ──► Processing ──► Paid ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Cancelled          Paid/Delivered ──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was created and is waiting for the workflow.
    #[default]
    Pending,

    /// The fulfillment workflow has picked the order up.
    Processing,

    /// Payment captured, ready to ship.
    Paid,

    /// Handed to the carrier.
    Shipped,

    /// Received by the customer.
    Delivered,

    /// Cancelled before shipping (terminal).
    Cancelled,

    /// Money returned to the customer (terminal).
    Refunded,
}

impl OrderStatus {
    /// Returns true if the fulfillment workflow may run for an order in this status.
    pub fn is_processable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Returns true if no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns the status name as stored in the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No successful charge yet.
    #[default]
    Pending,

    /// The charge went through.
    Completed,

    /// The payment authority declined the charge.
    Failed,

    /// The charge was returned.
    Refunded,
}

impl PaymentStatus {
    /// Returns true if money has already moved for this order.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }

    /// Returns the status name as stored in the record store.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
