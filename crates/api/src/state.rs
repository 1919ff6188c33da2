//! Shared application state.

use order_store::OrderStore;
use workflow::{ExecutionStore, WorkflowSupervisor};

/// Shared application state accessible from all handlers.
pub struct AppState<S, E>
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    pub orders: S,
    pub supervisor: WorkflowSupervisor<S, E>,
}
