//! Workflow execution status.

use serde::{Deserialize, Serialize};

/// The status of a workflow execution.
///
/// ```text
/// Pending ──► Running ◄──► Retrying
///                │
///                ├──► Completed
///                └──► Failed
/// ```
///
/// `Pending` can also go straight to `Failed` when the execution is
/// abandoned before it ever runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Admitted, not yet running.
    #[default]
    Pending,

    /// A step is executing.
    Running,

    /// Waiting out the backoff before retrying a step.
    Retrying,

    /// Every step finished (terminal).
    Completed,

    /// A step failed fatally or the execution was cancelled (terminal).
    Failed,
}

impl WorkflowStatus {
    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }

    /// Returns true while the execution is still moving.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Retrying => "retrying",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(WorkflowStatus::default(), WorkflowStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(!WorkflowStatus::Retrying.is_terminal());
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::Retrying).unwrap(),
            "\"retrying\""
        );
        assert_eq!(WorkflowStatus::Completed.to_string(), "completed");
    }
}
