//! Single-flight admission per order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::{ExecutionId, OrderId};

/// Tracks which orders have an execution in flight.
///
/// The check and the insert happen under one lock, so two concurrent
/// admissions for the same order can never both succeed. Cloning shares
/// the underlying set.
#[derive(Debug, Clone, Default)]
pub struct DispatchGuard {
    active: Arc<Mutex<HashMap<OrderId, ExecutionId>>>,
}

impl DispatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `order_id` as in flight for `execution_id`.
    ///
    /// Returns a permit that releases the order when dropped, or the id of
    /// the execution already in flight.
    pub fn try_admit(
        &self,
        order_id: &OrderId,
        execution_id: ExecutionId,
    ) -> Result<DispatchPermit, ExecutionId> {
        let mut active = self.lock();
        if let Some(existing) = active.get(order_id) {
            return Err(*existing);
        }
        active.insert(order_id.clone(), execution_id);
        drop(active);

        Ok(DispatchPermit {
            guard: self.clone(),
            order_id: order_id.clone(),
            execution_id,
            released: false,
        })
    }

    /// Execution in flight for `order_id`, if any.
    pub fn active_execution(&self, order_id: &OrderId) -> Option<ExecutionId> {
        self.lock().get(order_id).copied()
    }

    pub fn is_active(&self, order_id: &OrderId) -> bool {
        self.lock().contains_key(order_id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    // Only removes the entry if it still belongs to `execution_id`.
    fn release(&self, order_id: &OrderId, execution_id: ExecutionId) {
        let mut active = self.lock();
        if active.get(order_id) == Some(&execution_id) {
            active.remove(order_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OrderId, ExecutionId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that an order was admitted. Releases the order on drop.
#[must_use = "dropping the permit releases the order immediately"]
#[derive(Debug)]
pub struct DispatchPermit {
    guard: DispatchGuard,
    order_id: OrderId,
    execution_id: ExecutionId,
    released: bool,
}

impl DispatchPermit {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Releases the order now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.release(&self.order_id, self.execution_id);
        }
    }
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_admit_then_reject_duplicate() {
        let guard = DispatchGuard::new();
        let order = OrderId::new("O1");
        let first = ExecutionId::new();

        let permit = guard.try_admit(&order, first).unwrap();
        assert!(guard.is_active(&order));
        assert_eq!(guard.active_execution(&order), Some(first));

        let rejected = guard.try_admit(&order, ExecutionId::new()).unwrap_err();
        assert_eq!(rejected, first);

        permit.release();
        assert!(!guard.is_active(&order));
        assert!(guard.try_admit(&order, ExecutionId::new()).is_ok());
    }

    #[test]
    fn test_drop_releases() {
        let guard = DispatchGuard::new();
        let order = OrderId::new("O1");
        {
            let _permit = guard.try_admit(&order, ExecutionId::new()).unwrap();
            assert_eq!(guard.active_count(), 1);
        }
        assert_eq!(guard.active_count(), 0);
    }

    #[test]
    fn test_orders_are_independent() {
        let guard = DispatchGuard::new();
        let _a = guard.try_admit(&OrderId::new("A"), ExecutionId::new()).unwrap();
        let _b = guard.try_admit(&OrderId::new("B"), ExecutionId::new()).unwrap();
        assert_eq!(guard.active_count(), 2);
    }

    #[test]
    fn test_panicking_holder_still_releases() {
        let guard = DispatchGuard::new();
        let order = OrderId::new("O1");
        let permit = guard.try_admit(&order, ExecutionId::new()).unwrap();

        let result = thread::spawn(move || {
            let _permit = permit;
            panic!("step blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.is_active(&order));
    }

    #[test]
    fn test_concurrent_admissions_admit_exactly_one() {
        let guard = DispatchGuard::new();
        let barrier = Arc::new(Barrier::new(16));
        let order = OrderId::new("O1");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                let barrier = barrier.clone();
                let order = order.clone();
                thread::spawn(move || {
                    barrier.wait();
                    // Keep the permit alive so late threads still see it.
                    guard
                        .try_admit(&order, ExecutionId::new())
                        .ok()
                        .map(std::mem::forget)
                        .is_some()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 1);
        assert!(guard.is_active(&order));
    }
}
