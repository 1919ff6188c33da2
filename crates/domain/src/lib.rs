//! Order model for the fulfillment workflow.
//!
//! Orders live in an external keyed document store. This crate only
//! describes their shape and the business rules the workflow checks
//! before touching any collaborator:
//! - `Order` with its items, totals and shipping details
//! - `OrderStatus` / `PaymentStatus` lifecycles
//! - `Money` and other value objects

pub mod order;

pub use order::{
    Money, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    ShippingInfo, DEFAULT_CURRENCY,
};
