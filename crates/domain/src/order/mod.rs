//! Order record and related types.

mod model;
mod state;
mod value_objects;

pub use model::{DEFAULT_CURRENCY, Order};
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{Money, OrderItem, PaymentMethod, ProductId, ShippingInfo};

use thiserror::Error;

/// Business-rule violations that make an order unprocessable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// A line has a zero quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// A line has a non-positive unit price.
    #[error("Invalid price for {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: String, price: i64 },

    /// A line or the order total does not fit in the money range.
    #[error("Order amount overflows for {product_id}")]
    AmountOverflow { product_id: String },

    /// Stored total disagrees with the lines.
    #[error("Order total {stored} does not match item total {computed}")]
    TotalMismatch { stored: Money, computed: Money },

    /// Customer contact is missing or malformed.
    #[error("Invalid customer email: '{0}'")]
    InvalidEmail(String),

    /// Order status does not allow processing.
    #[error("Order cannot be processed in {0} status")]
    NotProcessable(OrderStatus),

    /// Money already moved for this order.
    #[error("Payment already {0} for this order")]
    PaymentAlreadySettled(PaymentStatus),
}
