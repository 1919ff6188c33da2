//! Identifier types shared across the workflow crates.

pub mod types;

pub use types::{ExecutionId, OrderId};
