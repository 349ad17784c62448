//! Saga orchestrator: drives one run of a saga definition.

use std::time::Instant;

use common::SagaId;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::watch;

use crate::context::SagaContext;
use crate::definition::SagaDefinition;
use crate::error::{CompensationOutcome, SagaFailure, StepError, StepFailure};
use crate::events::SagaEvent;
use crate::executor::{RunScope, StepCompletion, StepExecutor};
use crate::record::{SagaExecutionRecord, SagaRecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepStatus {
    Waiting,
    Running,
    Done,
    Failed,
}

/// Interprets saga definitions.
///
/// Steps whose dependencies have completed are dispatched together. On the
/// first step failure (or on cancellation) no further step is dispatched;
/// the run waits for in-flight steps to settle, then undoes every
/// completed step one at a time, in reverse completion order.
#[derive(Debug, Clone)]
pub struct SagaOrchestrator {
    executor: StepExecutor,
    records: SagaRecordStore,
}

impl SagaOrchestrator {
    pub fn new(executor: StepExecutor, records: SagaRecordStore) -> Self {
        Self { executor, records }
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    /// Returns the store holding the latest record of every run.
    pub fn records(&self) -> &SagaRecordStore {
        &self.records
    }

    /// Runs `definition` to completion with no way to cancel it.
    pub async fn execute(
        &self,
        definition: &SagaDefinition,
        ctx: &SagaContext,
    ) -> Result<SagaExecutionRecord, SagaFailure> {
        let (_keep_open, cancel) = watch::channel(false);
        self.run(SagaId::new(), definition, ctx, cancel).await
    }

    /// Runs `definition` as saga `saga_id`.
    ///
    /// Setting `cancel` to `true` stops dispatching and compensates what
    /// already completed. Dropping the sender does not cancel.
    #[tracing::instrument(skip_all, fields(%saga_id, saga = definition.name()))]
    pub async fn run(
        &self,
        saga_id: SagaId,
        definition: &SagaDefinition,
        ctx: &SagaContext,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<SagaExecutionRecord, SagaFailure> {
        metrics::counter!("saga_executions_total", "saga" => definition.name().to_string())
            .increment(1);
        let started = Instant::now();
        let scope = RunScope {
            saga_id,
            saga_name: definition.name(),
        };

        let mut record = SagaExecutionRecord::new(saga_id);
        self.record(scope, &mut record, SagaEvent::saga_started(definition.name()))
            .await;

        let steps = definition.steps();
        let dependencies = definition.dependency_indices();
        let mut status = vec![StepStatus::Waiting; steps.len()];
        let mut completed: Vec<StepCompletion> = Vec::new();
        let mut cause: Option<StepFailure> = None;
        let mut secondary: Vec<StepFailure> = Vec::new();
        let mut cancelled = *cancel.borrow();
        let mut watching = true;
        let mut in_flight = FuturesUnordered::new();

        loop {
            if cause.is_none() && !cancelled {
                for (i, step) in steps.iter().enumerate() {
                    let ready = status[i] == StepStatus::Waiting
                        && dependencies[i]
                            .iter()
                            .all(|&d| status[d] == StepStatus::Done);
                    if ready {
                        status[i] = StepStatus::Running;
                        let executor = &self.executor;
                        in_flight.push(async move { (i, executor.execute(scope, step, ctx).await) });
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                Some((i, outcome)) = in_flight.next() => match outcome {
                    Ok(completion) => {
                        status[i] = StepStatus::Done;
                        record.apply(&SagaEvent::StepCompleted(completion.event.clone()));
                        self.records.put(&record).await;
                        completed.push(completion);
                    }
                    Err(failure) => {
                        status[i] = StepStatus::Failed;
                        record.apply(&SagaEvent::step_failed(
                            &failure.step_id,
                            &failure.error,
                            failure.error.kind(),
                            failure.attempts,
                        ));
                        self.records.put(&record).await;
                        if cause.is_none() {
                            tracing::warn!(step = %failure.step_id, "step failed, no further steps will be dispatched");
                            cause = Some(failure);
                        } else {
                            secondary.push(failure);
                        }
                    }
                },
                changed = cancel.changed(), if watching && !cancelled => match changed {
                    Ok(()) => {
                        let requested = *cancel.borrow_and_update();
                        if requested {
                            tracing::warn!("saga cancelled, settling in-flight steps");
                            cancelled = true;
                        }
                    }
                    Err(_) => watching = false,
                },
                else => break,
            }
        }

        if cause.is_none() && !cancelled {
            self.record(scope, &mut record, SagaEvent::saga_completed())
                .await;
            let duration = started.elapsed().as_secs_f64();
            metrics::histogram!("saga_duration_seconds").record(duration);
            metrics::counter!("saga_completed").increment(1);
            tracing::info!(duration, steps = completed.len(), "saga completed");
            return Ok(record);
        }

        let (failed_step, cause) = match cause {
            Some(failure) => (Some(failure.step_id), failure.error),
            None => (None, StepError::Cancelled),
        };
        let compensation = self
            .compensate(scope, &mut record, completed, failed_step.clone(), &cause)
            .await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_failed").increment(1);
        tracing::warn!(
            duration,
            failed_step = failed_step.as_deref().unwrap_or("-"),
            cause = %cause,
            state = %record.state(),
            "saga failed"
        );

        Err(SagaFailure {
            saga_id,
            saga_name: definition.name().to_string(),
            failed_step,
            cause,
            secondary,
            compensation,
        })
    }

    /// Undoes completed steps in reverse completion order, one at a time.
    ///
    /// A failed compensation does not stop the remaining ones.
    async fn compensate(
        &self,
        scope: RunScope<'_>,
        record: &mut SagaExecutionRecord,
        completed: Vec<StepCompletion>,
        failed_step: Option<String>,
        cause: &StepError,
    ) -> CompensationOutcome {
        self.record(
            scope,
            record,
            SagaEvent::compensation_started(failed_step, cause),
        )
        .await;

        let mut outcome = CompensationOutcome::default();
        for completion in completed.into_iter().rev() {
            let Some(compensation) = completion.compensation else {
                continue;
            };
            metrics::counter!("saga_compensations_total").increment(1);
            tracing::info!(step = %completion.step_id, action = %compensation.describe(), "compensating");

            match self
                .executor
                .compensate(&completion.step_id, compensation.as_ref())
                .await
            {
                Ok(already_absent) => {
                    self.record(
                        scope,
                        record,
                        SagaEvent::compensation_step_completed(&completion.step_id, already_absent),
                    )
                    .await;
                    outcome.compensated.push(completion.step_id);
                }
                Err(err) => {
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::error!(
                        step = %completion.step_id,
                        result = %completion.result,
                        error = %err.error,
                        "compensation failed, record needs manual remediation"
                    );
                    self.record(
                        scope,
                        record,
                        SagaEvent::compensation_step_failed(
                            &completion.step_id,
                            &err.error,
                            err.error.kind(),
                            err.attempts,
                        ),
                    )
                    .await;
                    outcome.failed.push(err);
                }
            }
        }

        let terminal = if outcome.is_complete() {
            SagaEvent::saga_compensated()
        } else {
            SagaEvent::saga_failed(format!(
                "{} compensation(s) failed",
                outcome.failed.len()
            ))
        };
        self.record(scope, record, terminal).await;
        outcome
    }

    async fn record(
        &self,
        scope: RunScope<'_>,
        record: &mut SagaExecutionRecord,
        event: SagaEvent,
    ) {
        record.apply(&event);
        self.records.put(record).await;
        self.executor.emit(scope, event);
        if record.state().is_terminal() {
            self.executor.flush_events().await;
        }
    }
}
