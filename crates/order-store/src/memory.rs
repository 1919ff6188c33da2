use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::Order;
use tokio::sync::RwLock;

use crate::{OrderId, OrderStore, OrderStoreError, OrderUpdate, Result};

#[derive(Debug, Default)]
struct InMemoryState {
    orders: HashMap<OrderId, Order>,
    /// Every accepted update, in arrival order.
    update_log: Vec<(OrderId, OrderUpdate)>,
    failing_reads: u32,
    failing_updates: u32,
}

/// In-memory order store for tests and local runs.
///
/// Cloning shares the underlying state. The `fail_next_*` knobs make the
/// next N calls return `Unavailable` without touching any data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` reads fail with `Unavailable`.
    pub async fn fail_next_reads(&self, count: u32) {
        self.state.write().await.failing_reads = count;
    }

    /// Makes the next `count` updates fail with `Unavailable`.
    pub async fn fail_next_updates(&self, count: u32) {
        self.state.write().await.failing_updates = count;
    }

    /// Removes an order, as if it was deleted by another writer.
    pub async fn remove(&self, id: &OrderId) -> Option<Order> {
        self.state.write().await.orders.remove(id)
    }

    /// Edits an order in place outside the update contract, simulating a
    /// concurrent writer touching unrelated fields.
    pub async fn edit<F>(&self, id: &OrderId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Order),
    {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderStoreError::NotFound(id.clone()))?;
        f(order);
        Ok(())
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the accepted updates for one order, oldest first.
    pub async fn updates_for(&self, id: &OrderId) -> Vec<OrderUpdate> {
        self.state
            .read()
            .await
            .update_log
            .iter()
            .filter(|(order_id, _)| order_id == id)
            .map(|(_, update)| update.clone())
            .collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, id: &OrderId) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(OrderStoreError::Unavailable(format!(
                "read of order {id} timed out"
            )));
        }

        state
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| OrderStoreError::NotFound(id.clone()))
    }

    async fn update_order_fields(&self, id: &OrderId, update: OrderUpdate) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.failing_updates > 0 {
            state.failing_updates -= 1;
            return Err(OrderStoreError::Unavailable(format!(
                "update of order {id} timed out"
            )));
        }

        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderStoreError::NotFound(id.clone()))?;
        update.apply_to(order, Utc::now());
        let updated = order.clone();

        tracing::debug!(order_id = %id, fields = ?update.field_names(), "order fields updated");
        state.update_log.push((id.clone(), update));

        Ok(updated)
    }

    async fn insert_order(&self, order: Order) -> Result<()> {
        let mut state = self.state.write().await;

        if state.orders.contains_key(&order.id) {
            return Err(OrderStoreError::AlreadyExists(order.id));
        }
        state.orders.insert(order.id.clone(), order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, OrderItem, OrderStatus, PaymentStatus};

    fn order(id: &str) -> Order {
        Order::new(
            id,
            "ana@example.com",
            vec![OrderItem::new("P-1", "Widget", 2, Money::from_cents(1000))],
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryOrderStore::new();
        store.insert_order(order("O1")).await.unwrap();

        let loaded = store.get_order(&OrderId::new("O1")).await.unwrap();
        assert_eq!(loaded.id.as_str(), "O1");
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let store = InMemoryOrderStore::new();
        store.insert_order(order("O1")).await.unwrap();

        let result = store.insert_order(order("O1")).await;
        assert!(matches!(result, Err(OrderStoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_missing_order() {
        let store = InMemoryOrderStore::new();
        let result = store.get_order(&OrderId::new("nope")).await;
        assert!(matches!(result, Err(OrderStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = InMemoryOrderStore::new();
        let result = store
            .update_order_fields(
                &OrderId::new("nope"),
                OrderUpdate::new().status(OrderStatus::Processing),
            )
            .await;
        assert!(matches!(result, Err(OrderStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_preserves_concurrent_edits() {
        let store = InMemoryOrderStore::new();
        let id = OrderId::new("O1");
        store.insert_order(order("O1")).await.unwrap();

        store
            .edit(&id, |o| o.shipping.tracking_id = Some("TRK-1".into()))
            .await
            .unwrap();
        let updated = store
            .update_order_fields(
                &id,
                OrderUpdate::new().payment_status(PaymentStatus::Completed),
            )
            .await
            .unwrap();

        assert_eq!(updated.payment_status, PaymentStatus::Completed);
        assert_eq!(updated.shipping.tracking_id.as_deref(), Some("TRK-1"));
        assert_eq!(store.updates_for(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_update_failures() {
        let store = InMemoryOrderStore::new();
        let id = OrderId::new("O1");
        store.insert_order(order("O1")).await.unwrap();
        store.fail_next_updates(2).await;

        let update = OrderUpdate::new().status(OrderStatus::Processing);
        for _ in 0..2 {
            let err = store
                .update_order_fields(&id, update.clone())
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        store.update_order_fields(&id, update).await.unwrap();

        let loaded = store.get_order(&id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Processing);
        assert_eq!(store.updates_for(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_injected_read_failures() {
        let store = InMemoryOrderStore::new();
        store.insert_order(order("O1")).await.unwrap();
        store.fail_next_reads(1).await;

        let id = OrderId::new("O1");
        assert!(store.get_order(&id).await.unwrap_err().is_transient());
        assert!(store.get_order(&id).await.is_ok());
    }
}
