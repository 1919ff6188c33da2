//! Inventory authority trait and in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::OrderId;
use domain::{OrderItem, ProductId};

use crate::error::StepError;

const SERVICE: &str = "inventory";

/// A line to reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationItem {
    pub product_id: ProductId,
    pub sku: String,
    pub quantity: u32,
}

impl From<&OrderItem> for ReservationItem {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            sku: item.sku.clone(),
            quantity: item.quantity,
        }
    }
}

/// Holds and consumes stock for orders.
///
/// All operations are keyed by order id and must be idempotent: reserving
/// twice returns the same reservation, committing or releasing twice is a
/// no-op.
#[async_trait]
pub trait InventoryAuthority: Send + Sync {
    /// Holds stock for the order. Returns the reservation id.
    async fn reserve(&self, order_id: &OrderId, items: &[ReservationItem])
    -> Result<String, StepError>;

    /// Turns the order's reservation into a stock deduction.
    async fn commit(&self, order_id: &OrderId, items: &[ReservationItem]) -> Result<(), StepError>;

    /// Drops the order's reservation if it was not committed.
    async fn release(&self, order_id: &OrderId, items: &[ReservationItem])
    -> Result<(), StepError>;
}

#[derive(Debug, Clone)]
struct Reservation {
    id: String,
    quantities: BTreeMap<ProductId, u32>,
    committed: bool,
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    /// Products without an entry have unlimited stock.
    stock: HashMap<ProductId, u32>,
    reservations: HashMap<OrderId, Reservation>,
    next_id: u32,
    reserve_calls: u32,
    transient_reserve_failures: u32,
    transient_commit_failures: u32,
}

impl InMemoryInventoryState {
    fn held(&self, product_id: &ProductId) -> u32 {
        self.reservations
            .values()
            .filter(|r| !r.committed)
            .filter_map(|r| r.quantities.get(product_id))
            .fold(0u32, |held, quantity| held.saturating_add(*quantity))
    }
}

fn quantities(items: &[ReservationItem]) -> BTreeMap<ProductId, u32> {
    let mut totals = BTreeMap::new();
    for item in items {
        let total = totals.entry(item.product_id.clone()).or_insert(0u32);
        *total = total.saturating_add(item.quantity);
    }
    totals
}

/// In-memory inventory authority for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryAuthority {
    state: Arc<Mutex<InMemoryInventoryState>>,
}

impl InMemoryInventoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks stock for a product.
    pub fn set_stock(&self, product_id: impl Into<ProductId>, quantity: u32) {
        self.state().stock.insert(product_id.into(), quantity);
    }

    /// On-hand stock for a tracked product.
    pub fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state().stock.get(product_id).copied()
    }

    /// Fails the next `count` reserve calls.
    pub fn fail_transient_reserves(&self, count: u32) {
        self.state().transient_reserve_failures = count;
    }

    /// Fails the next `count` commit calls.
    pub fn fail_transient_commits(&self, count: u32) {
        self.state().transient_commit_failures = count;
    }

    /// Returns true if the order holds an uncommitted reservation.
    pub fn is_reserved(&self, order_id: &OrderId) -> bool {
        self.state()
            .reservations
            .get(order_id)
            .is_some_and(|r| !r.committed)
    }

    pub fn is_committed(&self, order_id: &OrderId) -> bool {
        self.state()
            .reservations
            .get(order_id)
            .is_some_and(|r| r.committed)
    }

    /// Number of uncommitted reservations.
    pub fn reservation_count(&self) -> usize {
        self.state()
            .reservations
            .values()
            .filter(|r| !r.committed)
            .count()
    }

    pub fn reserve_calls(&self) -> u32 {
        self.state().reserve_calls
    }

    fn state(&self) -> MutexGuard<'_, InMemoryInventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl InventoryAuthority for InMemoryInventoryAuthority {
    async fn reserve(
        &self,
        order_id: &OrderId,
        items: &[ReservationItem],
    ) -> Result<String, StepError> {
        let mut state = self.state();
        state.reserve_calls += 1;

        if state.transient_reserve_failures > 0 {
            state.transient_reserve_failures -= 1;
            return Err(StepError::transient(SERVICE, "warehouse service timeout"));
        }

        if let Some(existing) = state.reservations.get(order_id) {
            return Ok(existing.id.clone());
        }

        let wanted = quantities(items);
        for (product_id, requested) in &wanted {
            if let Some(on_hand) = state.stock.get(product_id) {
                let available = on_hand.saturating_sub(state.held(product_id));
                if *requested > available {
                    return Err(StepError::InsufficientStock {
                        product_id: product_id.to_string(),
                        requested: *requested,
                        available,
                    });
                }
            }
        }

        state.next_id += 1;
        let id = format!("RSV-{:04}", state.next_id);
        state.reservations.insert(
            order_id.clone(),
            Reservation {
                id: id.clone(),
                quantities: wanted,
                committed: false,
            },
        );
        Ok(id)
    }

    async fn commit(&self, order_id: &OrderId, _items: &[ReservationItem]) -> Result<(), StepError> {
        let mut state = self.state();

        if state.transient_commit_failures > 0 {
            state.transient_commit_failures -= 1;
            return Err(StepError::transient(SERVICE, "warehouse service timeout"));
        }

        let reservation = state
            .reservations
            .get(order_id)
            .cloned()
            .ok_or_else(|| {
                StepError::Precondition(format!("no inventory reservation for order {order_id}"))
            })?;
        if reservation.committed {
            return Ok(());
        }

        for (product_id, quantity) in &reservation.quantities {
            if let Some(on_hand) = state.stock.get_mut(product_id) {
                *on_hand = on_hand.saturating_sub(*quantity);
            }
        }
        if let Some(r) = state.reservations.get_mut(order_id) {
            r.committed = true;
        }
        Ok(())
    }

    async fn release(&self, order_id: &OrderId, _items: &[ReservationItem]) -> Result<(), StepError> {
        let mut state = self.state();
        if state
            .reservations
            .get(order_id)
            .is_some_and(|r| !r.committed)
        {
            state.reservations.remove(order_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(product: &str, quantity: u32) -> Vec<ReservationItem> {
        vec![ReservationItem {
            product_id: ProductId::new(product),
            sku: product.into(),
            quantity,
        }]
    }

    #[tokio::test]
    async fn test_reserve_is_idempotent() {
        let inventory = InMemoryInventoryAuthority::new();
        let order = OrderId::new("O1");

        let first = inventory.reserve(&order, &items("P-1", 2)).await.unwrap();
        let second = inventory.reserve(&order, &items("P-1", 2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inventory.reservation_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock() {
        let inventory = InMemoryInventoryAuthority::new();
        inventory.set_stock("P-1", 3);

        inventory
            .reserve(&OrderId::new("O1"), &items("P-1", 2))
            .await
            .unwrap();
        let err = inventory
            .reserve(&OrderId::new("O2"), &items("P-1", 2))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StepError::InsufficientStock {
                product_id: "P-1".into(),
                requested: 2,
                available: 1,
            }
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_commit_deducts_stock_once() {
        let inventory = InMemoryInventoryAuthority::new();
        inventory.set_stock("P-1", 5);
        let order = OrderId::new("O1");

        inventory.reserve(&order, &items("P-1", 2)).await.unwrap();
        inventory.commit(&order, &items("P-1", 2)).await.unwrap();
        inventory.commit(&order, &items("P-1", 2)).await.unwrap();

        assert_eq!(inventory.stock_of(&ProductId::new("P-1")), Some(3));
        assert!(inventory.is_committed(&order));
        assert_eq!(inventory.reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_without_reservation_fails() {
        let inventory = InMemoryInventoryAuthority::new();
        let err = inventory
            .commit(&OrderId::new("O1"), &items("P-1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_release_frees_held_stock() {
        let inventory = InMemoryInventoryAuthority::new();
        inventory.set_stock("P-1", 2);
        let order = OrderId::new("O1");

        inventory.reserve(&order, &items("P-1", 2)).await.unwrap();
        inventory.release(&order, &items("P-1", 2)).await.unwrap();
        inventory.release(&order, &items("P-1", 2)).await.unwrap();

        assert!(!inventory.is_reserved(&order));
        assert!(
            inventory
                .reserve(&OrderId::new("O2"), &items("P-1", 2))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_release_keeps_committed_reservation() {
        let inventory = InMemoryInventoryAuthority::new();
        let order = OrderId::new("O1");

        inventory.reserve(&order, &items("P-1", 1)).await.unwrap();
        inventory.commit(&order, &items("P-1", 1)).await.unwrap();
        inventory.release(&order, &items("P-1", 1)).await.unwrap();

        assert!(inventory.is_committed(&order));
    }
}
