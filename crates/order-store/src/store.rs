use async_trait::async_trait;
use domain::Order;

use crate::{OrderId, OrderUpdate, Result};

/// Core trait for order record stores.
///
/// Implementations must be thread-safe (Send + Sync): many workflows read
/// and update different orders concurrently.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads the current order record.
    ///
    /// Returns `NotFound` if no order is stored under `id`.
    async fn get_order(&self, id: &OrderId) -> Result<Order>;

    /// Applies a targeted field update to an existing order.
    ///
    /// Only the fields named in `update` (plus `updated_at`) are written;
    /// the update is last-writer-wins per field. Returns the order as it
    /// looks after the write, or `NotFound` if the order does not exist.
    async fn update_order_fields(&self, id: &OrderId, update: OrderUpdate) -> Result<Order>;

    /// Stores a new order. Fails with `AlreadyExists` on key collision.
    async fn insert_order(&self, order: Order) -> Result<()>;
}
