//! Saga error types.

use std::time::Duration;

use common::SagaId;
use cqrs::{BusError, HandlerError};
use serde::Serialize;
use thiserror::Error;

use crate::state::SagaState;

/// Errors raised by the saga context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No value has been written under the key.
    #[error("Context key not found: {0}")]
    KeyNotFound(String),

    /// The value under the key has an unexpected shape.
    #[error("Context key {key} holds an invalid value: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Failure of one attempt to run a step or a compensation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// The handler reached by the bus failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The bus could not route the command.
    #[error("Dispatch failed: {0}")]
    Dispatch(BusError),

    /// The attempt exceeded the step timeout.
    #[error("Step timed out after {after:?}")]
    Timeout { after: Duration },

    /// A value the step reads from the context was missing or malformed.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The run was cancelled before the step could finish.
    #[error("Saga cancelled")]
    Cancelled,
}

impl StepError {
    /// Returns true if the attempt may succeed when retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StepError::Handler(e) => e.is_transient(),
            StepError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StepError::Handler(HandlerError::NotFound(_)))
    }

    /// Returns the classification as a string, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Handler(e) => e.kind(),
            StepError::Dispatch(_) => "configuration",
            StepError::Timeout { .. } => "transient",
            StepError::Context(_) => "context",
            StepError::Cancelled => "cancelled",
        }
    }
}

impl From<BusError> for StepError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Handler(e) => StepError::Handler(e),
            other => StepError::Dispatch(other),
        }
    }
}

/// A step that failed after exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Step '{step_id}' failed after {attempts} attempt(s): {error}")]
pub struct StepFailure {
    pub step_id: String,
    pub error: StepError,
    pub attempts: u32,
}

/// A compensation that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Compensation of step '{step_id}' failed after {attempts} attempt(s): {error}")]
pub struct CompensationError {
    pub step_id: String,
    pub error: StepError,
    pub attempts: u32,
}

/// What happened while undoing the completed steps of a failed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompensationOutcome {
    /// Steps whose compensation succeeded, in the order they were undone.
    pub compensated: Vec<String>,

    /// Compensations that failed, in the order they were attempted.
    #[serde(serialize_with = "serialize_errors")]
    pub failed: Vec<CompensationError>,
}

impl CompensationOutcome {
    /// Returns true if every compensation succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

fn serialize_errors<S: serde::Serializer>(
    errors: &[CompensationError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

/// The consolidated failure of a saga run.
///
/// Carries the root cause, any failures observed while in-flight steps were
/// settling, and the compensation outcome. A run that failed is never
/// reported as a success, even when every compensation succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{saga_name} saga {saga_id} failed at {step}: {cause}", step = .failed_step.as_deref().unwrap_or("cancellation"))]
pub struct SagaFailure {
    pub saga_id: SagaId,
    pub saga_name: String,

    /// The step whose failure triggered compensation; `None` when the run
    /// was cancelled without any step failing.
    pub failed_step: Option<String>,

    pub cause: StepError,

    /// Failures of other steps that settled after the cause was observed.
    pub secondary: Vec<StepFailure>,

    pub compensation: CompensationOutcome,
}

impl SagaFailure {
    /// Returns the terminal state of the failed run.
    pub fn state(&self) -> SagaState {
        if self.compensation.is_complete() {
            SagaState::Compensated
        } else {
            SagaState::Failed
        }
    }

    /// Returns true if at least one compensation failed, leaving records
    /// that need manual remediation.
    pub fn is_compensation_failure(&self) -> bool {
        !self.compensation.is_complete()
    }

    /// Returns the classification of the failure, for logs, metric labels
    /// and HTTP mapping.
    pub fn kind(&self) -> &'static str {
        if self.is_compensation_failure() {
            "compensation_failure"
        } else {
            self.cause.kind()
        }
    }
}

/// Errors raised while defining or running a saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Two steps share an ID.
    #[error("Duplicate step '{0}'")]
    DuplicateStep(String),

    /// A step depends on a step that does not exist.
    #[error("Step '{step}' depends on unknown step '{depends_on}'")]
    UnknownDependency { step: String, depends_on: String },

    /// A step depends on a step declared after it.
    #[error("Step '{step}' depends on '{depends_on}', which is declared after it")]
    DependencyDeclaredLater { step: String, depends_on: String },

    /// More than one step writes the same context key.
    #[error("Context key '{key}' is written by both '{first}' and '{second}'")]
    MultipleWriters {
        key: String,
        first: String,
        second: String,
    },

    /// A step reads a key without being ordered after the step writing it.
    #[error("Step '{step}' reads '{key}' but does not depend on its writer '{writer}'")]
    UnorderedRead {
        step: String,
        key: String,
        writer: String,
    },

    /// The run failed; completed steps went through compensation.
    #[error(transparent)]
    Failed(Box<SagaFailure>),

    /// The run completed without producing the expected result.
    #[error("Saga completed without a result for step '{0}'")]
    MissingResult(String),

    /// The task driving the run stopped before reporting an outcome.
    #[error("Saga task aborted: {0}")]
    Aborted(String),
}

impl SagaError {
    /// Returns the run failure, if the saga got as far as running.
    pub fn failure(&self) -> Option<&SagaFailure> {
        match self {
            SagaError::Failed(f) => Some(f),
            _ => None,
        }
    }
}

impl From<SagaFailure> for SagaError {
    fn from(failure: SagaFailure) -> Self {
        SagaError::Failed(Box::new(failure))
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
