//! Adapter over the external order record store.
//!
//! The workflow treats the store as a keyed document store it does not
//! own: it reads whole orders and writes a small set of status fields
//! through [`OrderUpdate`], leaving everything else untouched.

pub mod error;
pub mod memory;
pub mod store;
pub mod update;

pub use common::OrderId;
pub use error::{OrderStoreError, Result};
pub use memory::InMemoryOrderStore;
pub use store::OrderStore;
pub use update::{FieldValue, OrderField, OrderUpdate};
