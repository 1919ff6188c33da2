//! Notification sender trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StepError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Email,
    Sms,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A message to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    /// Template name, e.g. "order_confirmed".
    pub template: String,
    pub data: BTreeMap<String, String>,
    pub priority: Priority,
}

/// Sends notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), StepError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<Notification>,
    transient_failures: u32,
    unavailable: bool,
}

/// In-memory notification sender that records what it sends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSender {
    state: Arc<Mutex<InMemoryNotificationState>>,
}

impl InMemoryNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` sends.
    pub fn fail_transient(&self, count: u32) {
        self.state().transient_failures = count;
    }

    /// Fails every send while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.state().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state().sent.len()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryNotificationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationSender for InMemoryNotificationSender {
    async fn send(&self, notification: Notification) -> Result<(), StepError> {
        let mut state = self.state();

        if state.unavailable {
            return Err(StepError::transient("notification", "mail relay refused connection"));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(StepError::transient("notification", "mail relay timeout"));
        }

        state.sent.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            kind: NotificationKind::Email,
            recipient: "ana@example.com".into(),
            template: "order_confirmed".into(),
            data: BTreeMap::new(),
            priority: Priority::Normal,
        }
    }

    #[tokio::test]
    async fn test_records_sent_notifications() {
        let sender = InMemoryNotificationSender::new();
        sender.send(notification()).await.unwrap();
        assert_eq!(sender.sent_count(), 1);
        assert_eq!(sender.sent()[0].template, "order_confirmed");
    }

    #[tokio::test]
    async fn test_unavailable_sender_fails() {
        let sender = InMemoryNotificationSender::new();
        sender.set_unavailable(true);
        assert!(sender.send(notification()).await.unwrap_err().is_retryable());
        assert_eq!(sender.sent_count(), 0);
    }
}
