//! HTTP API for the order fulfillment workflow.
//!
//! Exposes order creation and lookup, workflow triggering and status
//! endpoints, with structured logging (tracing) and request tracing.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use order_store::{InMemoryOrderStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workflow::{
    ExecutionStore, InMemoryExecutionStore, InMemoryInventoryAuthority,
    InMemoryNotificationSender, InMemoryPaymentAuthority, WorkflowEngine, WorkflowError,
    WorkflowSupervisor, order_fulfillment,
};

use config::Config;
pub use state::AppState;

/// State backed entirely by in-memory stores and collaborators.
pub type DefaultState = AppState<InMemoryOrderStore, InMemoryExecutionStore>;

/// In-memory collaborators used by the default state.
///
/// Cloning shares state, so callers can keep a handle to drive or
/// inspect the fakes after building the app.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServices {
    pub inventory: InMemoryInventoryAuthority,
    pub payment: InMemoryPaymentAuthority,
    pub notifier: InMemoryNotificationSender,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, E>(state: Arc<AppState<S, E>>) -> Router
where
    S: OrderStore + 'static,
    E: ExecutionStore + 'static,
{
    Router::new()
        .route("/health", get(routes::health::check::<S, E>))
        .route("/orders", post(routes::orders::create::<S, E>))
        .route("/orders/{id}", get(routes::orders::get::<S, E>))
        .route("/orders/{id}/process", post(routes::workflows::process::<S, E>))
        .route("/orders/{id}/workflow", get(routes::workflows::status::<S, E>))
        .route(
            "/orders/{id}/workflow/history",
            get(routes::workflows::history::<S, E>),
        )
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory stores and
/// collaborators.
///
/// Must be called from within a Tokio runtime.
pub fn create_default_state(config: &Config) -> Result<Arc<DefaultState>, WorkflowError> {
    create_state(config, InMemoryOrderStore::new(), InMemoryServices::default())
}

/// Creates application state over the given order store and fakes.
pub fn create_state(
    config: &Config,
    orders: InMemoryOrderStore,
    services: InMemoryServices,
) -> Result<Arc<DefaultState>, WorkflowError> {
    let registry =
        order_fulfillment::registry(services.inventory, services.payment, services.notifier)?;
    let engine = WorkflowEngine::new(
        orders.clone(),
        InMemoryExecutionStore::new(),
        registry,
        config.workflow,
    );

    Ok(Arc::new(AppState {
        orders,
        supervisor: WorkflowSupervisor::new(engine),
    }))
}
