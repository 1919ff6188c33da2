//! Runs single step attempts under a timeout and classifies the result.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::StepError;
use crate::registry::StepDefinition;
use crate::step::{StepContext, StepDetail};

/// Classified result of one step attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success(StepDetail),
    /// Another attempt may succeed.
    RetryableFailure(String),
    /// Retrying cannot help.
    FatalFailure(String),
}

impl StepOutcome {
    /// Maps a step result to an outcome.
    pub fn classify(result: Result<StepDetail, StepError>) -> Self {
        match result {
            Ok(detail) => StepOutcome::Success(detail),
            Err(err) if err.is_retryable() => StepOutcome::RetryableFailure(err.to_string()),
            Err(err) => StepOutcome::FatalFailure(err.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success(_))
    }
}

/// Runs step attempts with a per-attempt timeout.
#[derive(Debug, Clone, Copy)]
pub struct StepExecutor {
    timeout: Duration,
}

impl StepExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for an attempt starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Runs one attempt of `definition`.
    ///
    /// An attempt still running at `ctx.deadline` is dropped and reported
    /// as a retryable timeout.
    #[tracing::instrument(skip_all, fields(step = definition.name(), attempt = ctx.attempt))]
    pub async fn execute(&self, definition: &StepDefinition, ctx: &StepContext<'_>) -> StepOutcome {
        let result = match tokio::time::timeout_at(ctx.deadline, definition.step().run(ctx)).await
        {
            Ok(result) => result,
            Err(_) => Err(StepError::Timeout(self.timeout)),
        };

        let outcome = StepOutcome::classify(result);
        match &outcome {
            StepOutcome::Success(detail) => {
                tracing::debug!(summary = %detail.summary, "step attempt succeeded");
            }
            StepOutcome::RetryableFailure(reason) => {
                tracing::debug!(%reason, "step attempt failed, retryable");
            }
            StepOutcome::FatalFailure(reason) => {
                tracing::debug!(%reason, "step attempt failed, fatal");
            }
        }
        outcome
    }

    /// Runs the compensation of `definition` under the same timeout.
    pub async fn compensate(
        &self,
        definition: &StepDefinition,
        ctx: &StepContext<'_>,
    ) -> Result<(), StepError> {
        tokio::time::timeout_at(ctx.deadline, definition.step().compensate(ctx))
            .await
            .unwrap_or(Err(StepError::Timeout(self.timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;
    use async_trait::async_trait;
    use common::ExecutionId;
    use domain::{Money, Order, OrderItem};
    use tokio_util::sync::CancellationToken;

    struct Scripted {
        delay: Duration,
        result: Result<StepDetail, StepError>,
    }

    #[async_trait]
    impl Step for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn run(&self, _ctx: &StepContext<'_>) -> Result<StepDetail, StepError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    fn order() -> Order {
        Order::new(
            "O1",
            "ana@example.com",
            vec![OrderItem::new("P-1", "Widget", 1, Money::from_cents(100))],
        )
    }

    async fn run(executor: StepExecutor, step: Scripted) -> StepOutcome {
        let order = order();
        let cancel = CancellationToken::new();
        let ctx = StepContext {
            execution_id: ExecutionId::new(),
            order: &order,
            results: &[],
            attempt: 1,
            deadline: executor.deadline(),
            cancel: &cancel,
        };
        executor.execute(&StepDefinition::new(step), &ctx).await
    }

    #[test]
    fn test_classify() {
        assert!(StepOutcome::classify(Ok(StepDetail::new("ok"))).is_success());
        assert_eq!(
            StepOutcome::classify(Err(StepError::transient("inventory", "reset"))),
            StepOutcome::RetryableFailure("inventory unavailable: reset".into())
        );
        assert_eq!(
            StepOutcome::classify(Err(StepError::Declined("no funds".into()))),
            StepOutcome::FatalFailure("Payment declined: no funds".into())
        );
    }

    #[tokio::test]
    async fn test_execute_success() {
        let outcome = run(
            StepExecutor::new(Duration::from_secs(1)),
            Scripted {
                delay: Duration::ZERO,
                result: Ok(StepDetail::new("done").with_reference("REF-1")),
            },
        )
        .await;
        assert_eq!(
            outcome,
            StepOutcome::Success(StepDetail::new("done").with_reference("REF-1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_as_retryable() {
        let outcome = run(
            StepExecutor::new(Duration::from_millis(50)),
            Scripted {
                delay: Duration::from_secs(10),
                result: Ok(StepDetail::new("too late")),
            },
        )
        .await;
        assert!(matches!(outcome, StepOutcome::RetryableFailure(reason) if reason.contains("timed out")));
    }
}
