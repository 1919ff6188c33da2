//! Execution persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ExecutionId, OrderId};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::events::WorkflowEvent;
use crate::execution::WorkflowExecution;

/// Stores execution snapshots and their event logs.
///
/// Terminal executions stay queryable after a newer execution for the
/// same order is admitted.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Appends `event` to the log and stores the snapshot it produced.
    async fn save(&self, execution: &WorkflowExecution, event: &WorkflowEvent) -> Result<()>;

    async fn get(&self, execution_id: ExecutionId) -> Result<Option<WorkflowExecution>>;

    /// The most recently admitted execution for an order.
    async fn latest_for_order(&self, order_id: &OrderId) -> Result<Option<WorkflowExecution>>;

    /// Every execution for an order, oldest first.
    async fn history(&self, order_id: &OrderId) -> Result<Vec<WorkflowExecution>>;

    /// Event log of one execution, in order.
    async fn events(&self, execution_id: ExecutionId) -> Result<Vec<WorkflowEvent>>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    executions: HashMap<ExecutionId, WorkflowExecution>,
    by_order: HashMap<OrderId, Vec<ExecutionId>>,
    events: HashMap<ExecutionId, Vec<WorkflowEvent>>,
}

/// In-memory execution store. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions stored.
    pub async fn execution_count(&self) -> usize {
        self.state.read().await.executions.len()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save(&self, execution: &WorkflowExecution, event: &WorkflowEvent) -> Result<()> {
        let mut state = self.state.write().await;
        let id = execution.id();

        if !state.executions.contains_key(&id) {
            state
                .by_order
                .entry(execution.order_id().clone())
                .or_default()
                .push(id);
        }
        state.executions.insert(id, execution.clone());
        state.events.entry(id).or_default().push(event.clone());
        Ok(())
    }

    async fn get(&self, execution_id: ExecutionId) -> Result<Option<WorkflowExecution>> {
        Ok(self.state.read().await.executions.get(&execution_id).cloned())
    }

    async fn latest_for_order(&self, order_id: &OrderId) -> Result<Option<WorkflowExecution>> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .get(order_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.executions.get(id))
            .cloned())
    }

    async fn history(&self, order_id: &OrderId) -> Result<Vec<WorkflowExecution>> {
        let state = self.state.read().await;
        Ok(state
            .by_order
            .get(order_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.executions.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn events(&self, execution_id: ExecutionId) -> Result<Vec<WorkflowEvent>> {
        Ok(self
            .state
            .read()
            .await
            .events
            .get(&execution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowStatus;

    async fn admit(store: &InMemoryExecutionStore, order: &str) -> WorkflowExecution {
        let event = WorkflowEvent::admitted(
            ExecutionId::new(),
            OrderId::new(order),
            "fulfill_order",
            "validate_order",
        );
        let mut execution = WorkflowExecution::default();
        execution.apply(event.clone());
        store.save(&execution, &event).await.unwrap();
        execution
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = InMemoryExecutionStore::new();
        let execution = admit(&store, "O1").await;

        let loaded = store.get(execution.id()).await.unwrap().unwrap();
        assert_eq!(loaded, execution);
        assert_eq!(store.events(execution.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let store = InMemoryExecutionStore::new();
        let order = OrderId::new("O1");

        let mut first = admit(&store, "O1").await;
        let failed = WorkflowEvent::failed("declined");
        first.apply(failed.clone());
        store.save(&first, &failed).await.unwrap();

        let second = admit(&store, "O1").await;

        let latest = store.latest_for_order(&order).await.unwrap().unwrap();
        assert_eq!(latest.id(), second.id());

        let history = store.history(&order).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status(), WorkflowStatus::Failed);
        assert_eq!(store.execution_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_order_has_no_executions() {
        let store = InMemoryExecutionStore::new();
        let order = OrderId::new("nope");
        assert!(store.latest_for_order(&order).await.unwrap().is_none());
        assert!(store.history(&order).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_replay_to_snapshot() {
        let store = InMemoryExecutionStore::new();
        let mut execution = admit(&store, "O1").await;
        for event in [
            WorkflowEvent::started(None),
            WorkflowEvent::step_started("validate_order", 0),
            WorkflowEvent::completed(),
        ] {
            execution.apply(event.clone());
            store.save(&execution, &event).await.unwrap();
        }

        let events = store.events(execution.id()).await.unwrap();
        assert_eq!(WorkflowExecution::replay(events), execution);
    }
}
