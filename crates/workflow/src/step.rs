//! The step contract.

use async_trait::async_trait;
use common::ExecutionId;
use domain::Order;
use order_store::OrderUpdate;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::execution::{StepResult, StepResultKind};

/// What a successful step reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDetail {
    pub summary: String,
    /// Identifier later steps or compensations may need.
    pub reference: Option<String>,
}

impl StepDetail {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Everything a step attempt can see.
///
/// `order` is a fresh snapshot loaded right before the attempt. `results`
/// is the history of the execution so far.
#[derive(Debug)]
pub struct StepContext<'a> {
    pub execution_id: ExecutionId,
    pub order: &'a Order,
    pub results: &'a [StepResult],
    /// 1 for the first attempt.
    pub attempt: u32,
    /// The attempt is abandoned once this passes.
    pub deadline: Instant,
    /// Fired when the supervisor shuts down.
    pub cancel: &'a CancellationToken,
}

impl StepContext<'_> {
    /// Reference produced by the latest success of `step`.
    pub fn reference_of(&self, step: &str) -> Option<&str> {
        self.results
            .iter()
            .rev()
            .find(|r| r.step == step && r.outcome == StepResultKind::Succeeded)
            .and_then(|r| r.reference.as_deref())
    }

    pub fn has_succeeded(&self, step: &str) -> bool {
        self.results
            .iter()
            .any(|r| r.step == step && r.outcome == StepResultKind::Succeeded)
    }
}

/// A named unit of work in a workflow.
///
/// Steps must be safe to re-run: a retried attempt may follow one whose
/// side effect landed but whose reply was lost.
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &'static str;

    /// Runs one attempt.
    async fn run(&self, ctx: &StepContext<'_>) -> Result<StepDetail, StepError>;

    /// Order fields to persist once the step succeeds.
    fn on_success(&self, _detail: &StepDetail) -> Option<OrderUpdate> {
        None
    }

    /// Extra order fields to persist when this step fails the workflow.
    fn on_failure(&self, _error: &str) -> Option<OrderUpdate> {
        None
    }

    /// A best-effort step that fails is recorded as degraded and the
    /// workflow continues.
    fn is_best_effort(&self) -> bool {
        false
    }

    /// Returns true if the step has side effects to undo on failure.
    fn compensates(&self) -> bool {
        false
    }

    /// Undoes the step's side effects. Must be idempotent.
    async fn compensate(&self, _ctx: &StepContext<'_>) -> Result<(), StepError> {
        Ok(())
    }
}
