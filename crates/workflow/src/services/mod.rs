//! External collaborators used by the fulfillment steps.
//!
//! Each collaborator is a trait with an in-memory implementation that
//! tests and local runs use. The in-memory versions can be told to fail.

pub mod inventory;
pub mod notification;
pub mod payment;

pub use inventory::{InMemoryInventoryAuthority, InventoryAuthority, ReservationItem};
pub use notification::{
    InMemoryNotificationSender, Notification, NotificationKind, NotificationSender, Priority,
};
pub use payment::{ChargeReceipt, ChargeRequest, InMemoryPaymentAuthority, PaymentAuthority};
