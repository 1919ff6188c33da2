//! Order fulfillment workflow engine.
//!
//! A workflow is an ordered list of named steps run against one order.
//! Each step either succeeds, fails transiently (and is retried with
//! exponential backoff) or fails fatally. On a fatal failure the steps
//! that already succeeded are compensated in reverse order and the order
//! is flagged for attention.
//!
//! The order fulfillment workflow runs these steps:
//! 1. Validate the order
//! 2. Reserve inventory
//! 3. Process payment
//! 4. Commit the inventory reservation
//! 5. Send notifications (best effort)
//! 6. Complete the order
//!
//! [`WorkflowSupervisor`] is the entry point: it admits at most one
//! in-flight execution per order and runs executions on background tasks.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod execution;
pub mod executor;
pub mod guard;
pub mod order_fulfillment;
pub mod registry;
pub mod services;
pub mod state;
pub mod step;
pub mod store;
pub mod supervisor;

pub use config::{RetryPolicy, WorkflowConfig};
pub use engine::WorkflowEngine;
pub use error::{StepError, WorkflowError};
pub use events::WorkflowEvent;
pub use execution::{StepResult, StepResultKind, WorkflowExecution};
pub use executor::{StepExecutor, StepOutcome};
pub use guard::{DispatchGuard, DispatchPermit};
pub use registry::{StepDefinition, StepRegistry};
pub use services::{
    ChargeReceipt, ChargeRequest, InMemoryInventoryAuthority, InMemoryNotificationSender,
    InMemoryPaymentAuthority, InventoryAuthority, Notification, NotificationKind,
    NotificationSender, PaymentAuthority, Priority, ReservationItem,
};
pub use state::WorkflowStatus;
pub use step::{Step, StepContext, StepDetail};
pub use store::{ExecutionStore, InMemoryExecutionStore};
pub use supervisor::{StartAck, WorkflowSupervisor};
