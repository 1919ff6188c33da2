use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key of an order in the external record store.
///
/// Orders are owned by the store, not by the workflow, so the identifier
/// is whatever string the store uses (UUIDs in production, short keys
/// such as `"O1"` in tests).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh order ID backed by a random UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for one run of the workflow engine.
///
/// Wraps a UUID so execution IDs cannot be mixed up with other
/// UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Creates a new random execution ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an execution ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ExecutionId> for Uuid {
    fn from(id: ExecutionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_string_conversion() {
        let id = OrderId::new("O1");
        assert_eq!(id.as_str(), "O1");

        let id2: OrderId = "O2".into();
        assert_eq!(id2.to_string(), "O2");
    }

    #[test]
    fn order_id_generate_is_unique_and_not_blank() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert_ne!(a, b);
        assert!(!a.is_blank());
        assert!(OrderId::new("  ").is_blank());
    }

    #[test]
    fn order_id_serializes_as_plain_string() {
        let id = OrderId::new("O1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"O1\"");
    }

    #[test]
    fn execution_id_new_creates_unique_ids() {
        let id1 = ExecutionId::new();
        let id2 = ExecutionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn execution_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = ExecutionId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }
}
