//! Step executor: runs one step with timeout and bounded retry.

use std::sync::Arc;

use common::{ResourceId, SagaId};
use cqrs::CommandBus;

use crate::context::SagaContext;
use crate::definition::StepDefinition;
use crate::emitter::{EventEmitter, EventPublisher};
use crate::error::{CompensationError, StepError, StepFailure};
use crate::events::{SagaEvent, SagaEventEnvelope, StepEvent};
use crate::settings::SagaSettings;
use crate::step::Compensation;

/// Identifies the run a step belongs to, for events and logs.
#[derive(Debug, Clone, Copy)]
pub struct RunScope<'a> {
    pub saga_id: SagaId,
    pub saga_name: &'a str,
}

/// A step that completed, with the compensation that undoes it.
pub struct StepCompletion {
    pub step_id: String,
    pub result: ResourceId,
    pub compensation: Option<Box<dyn Compensation>>,
    /// The event published for the completion.
    pub event: StepEvent,
}

impl std::fmt::Debug for StepCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCompletion")
            .field("step_id", &self.step_id)
            .field("result", &self.result)
            .field("compensable", &self.compensation.is_some())
            .finish()
    }
}

/// Outcome of one step: its completion, or the failure that ended it.
pub type StepOutcome = Result<StepCompletion, StepFailure>;

/// Runs single steps against the bus.
///
/// Transient failures and timeouts are retried up to the configured
/// bound. The executor never compensates: a failure is handed back to
/// the orchestrator.
#[derive(Clone)]
pub struct StepExecutor {
    bus: CommandBus,
    publisher: EventPublisher,
    settings: SagaSettings,
}

impl StepExecutor {
    pub fn new(bus: CommandBus, emitter: Arc<dyn EventEmitter>, settings: SagaSettings) -> Self {
        Self {
            bus,
            publisher: EventPublisher::new(emitter, settings.publish_timeout),
            settings,
        }
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    pub fn settings(&self) -> &SagaSettings {
        &self.settings
    }

    /// Runs `step`, writing its result into `ctx` under the step's output
    /// key and publishing a [`StepEvent`] on success.
    #[tracing::instrument(skip_all, fields(saga_id = %scope.saga_id, step = step.id()))]
    pub async fn execute(
        &self,
        scope: RunScope<'_>,
        step: &StepDefinition,
        ctx: &SagaContext,
    ) -> StepOutcome {
        let timeout = step.timeout().unwrap_or(self.settings.step_timeout);
        let policy = self.settings.step_retry;
        self.emit(scope, SagaEvent::step_started(step.id()));

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, step.action().execute(&self.bus, ctx))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout { after: timeout }),
            };

            match result {
                Ok(output) => {
                    if let Some(key) = step.output_key() {
                        ctx.set_id(key, output.result);
                    }
                    let event = StepEvent {
                        step_id: step.id().to_string(),
                        result: output.result,
                        output_key: step.output_key().map(str::to_string),
                        attempts: attempt,
                        completed_at: chrono::Utc::now(),
                    };
                    self.emit(scope, SagaEvent::StepCompleted(event.clone()));
                    tracing::debug!(result = %output.result, attempt, "step completed");

                    return Ok(StepCompletion {
                        step_id: step.id().to_string(),
                        result: output.result,
                        compensation: output.compensation,
                        event,
                    });
                }
                Err(e) if e.is_transient() && policy.can_retry(attempt) => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(attempt, error = %e, ?delay, "transient step failure, retrying");
                    metrics::counter!("saga_step_retries_total", "step" => step.id().to_string())
                        .increment(1);
                    self.emit(scope, SagaEvent::step_retried(step.id(), attempt, &e));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, kind = e.kind(), "step failed");
                    self.emit(
                        scope,
                        SagaEvent::step_failed(step.id(), &e, e.kind(), attempt),
                    );
                    return Err(StepFailure {
                        step_id: step.id().to_string(),
                        error: e,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    /// Runs a compensation, retrying transient failures within the
    /// compensation bound.
    ///
    /// A record that is already gone counts as compensated: returns
    /// `Ok(true)` in that case, `Ok(false)` after an actual deletion.
    pub async fn compensate(
        &self,
        step_id: &str,
        compensation: &dyn Compensation,
    ) -> Result<bool, CompensationError> {
        let timeout = self.settings.step_timeout;
        let policy = self.settings.compensation_retry;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, compensation.compensate(&self.bus))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout { after: timeout }),
            };

            match result {
                Ok(()) => return Ok(false),
                Err(e) if e.is_not_found() => {
                    tracing::info!(step = step_id, "record already absent, compensation skipped");
                    return Ok(true);
                }
                Err(e) if e.is_transient() && policy.can_retry(attempt) => {
                    tracing::warn!(step = step_id, attempt, error = %e, "compensation retry");
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
                Err(e) => {
                    return Err(CompensationError {
                        step_id: step_id.to_string(),
                        error: e,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    pub(crate) fn emit(&self, scope: RunScope<'_>, event: SagaEvent) {
        self.publisher
            .publish(SagaEventEnvelope::new(scope.saga_id, scope.saga_name, event));
    }

    /// Gives queued events up to one publish timeout to reach the emitter.
    pub(crate) async fn flush_events(&self) {
        if !self.publisher.flush(self.settings.publish_timeout).await {
            tracing::warn!("saga events still queued for the emitter");
        }
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
