//! Saga lifecycle events.

use chrono::{DateTime, Utc};
use common::{ResourceId, SagaId};
use serde::{Deserialize, Serialize};

/// Facts recorded while a saga run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// The run started.
    SagaStarted(SagaStartedData),

    /// A step's first attempt was dispatched.
    StepStarted(StepData),

    /// A step attempt failed transiently and will be retried.
    StepRetried(StepRetriedData),

    /// A step completed.
    StepCompleted(StepEvent),

    /// A step failed for good.
    StepFailed(StepFailedData),

    /// Compensation of the completed steps started.
    CompensationStarted(CompensationData),

    /// A completed step was undone.
    CompensationStepCompleted(CompensationStepData),

    /// A completed step could not be undone.
    CompensationStepFailed(StepFailedData),

    /// Every step completed.
    SagaCompleted(SagaFinishedData),

    /// The run failed and every completed step was undone.
    SagaCompensated(SagaFinishedData),

    /// The run failed and at least one compensation failed.
    SagaFailed(SagaFailedData),
}

impl SagaEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepRetried(_) => "StepRetried",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaCompensated(_) => "SagaCompensated",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }

    /// Returns true for the events that close a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaEvent::SagaCompleted(_) | SagaEvent::SagaCompensated(_) | SagaEvent::SagaFailed(_)
        )
    }

    /// Returns the step the event is about, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            SagaEvent::StepStarted(d) => Some(&d.step_id),
            SagaEvent::StepRetried(d) => Some(&d.step_id),
            SagaEvent::StepCompleted(d) => Some(&d.step_id),
            SagaEvent::StepFailed(d) | SagaEvent::CompensationStepFailed(d) => Some(&d.step_id),
            SagaEvent::CompensationStepCompleted(d) => Some(&d.step_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_name: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRetriedData {
    pub step_id: String,
    /// The attempt that failed (1-based).
    pub attempt: u32,
    pub error: String,
}

/// Published after each completed step: step `step_id` created `result`
/// at `completed_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_id: String,
    pub result: ResourceId,
    /// Context key the result was written under.
    pub output_key: Option<String>,
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_id: String,
    pub error: String,
    /// Failure classification (transient, validation, not_found...).
    pub kind: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    /// The failed step; `None` when the run was cancelled.
    pub failed_step: Option<String>,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationStepData {
    pub step_id: String,
    /// True when the record was already gone.
    pub already_absent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFinishedData {
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(saga_name: impl Into<String>) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_name: saga_name.into(),
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step_id: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData {
            step_id: step_id.into(),
        })
    }

    pub fn step_retried(step_id: impl Into<String>, attempt: u32, error: impl ToString) -> Self {
        SagaEvent::StepRetried(StepRetriedData {
            step_id: step_id.into(),
            attempt,
            error: error.to_string(),
        })
    }

    pub fn step_completed(
        step_id: impl Into<String>,
        result: ResourceId,
        output_key: Option<String>,
        attempts: u32,
    ) -> Self {
        SagaEvent::StepCompleted(StepEvent {
            step_id: step_id.into(),
            result,
            output_key,
            attempts,
            completed_at: Utc::now(),
        })
    }

    pub fn step_failed(
        step_id: impl Into<String>,
        error: impl ToString,
        kind: &str,
        attempts: u32,
    ) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_id: step_id.into(),
            error: error.to_string(),
            kind: kind.to_string(),
            attempts,
        })
    }

    pub fn compensation_started(failed_step: Option<String>, cause: impl ToString) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            failed_step,
            cause: cause.to_string(),
        })
    }

    pub fn compensation_step_completed(step_id: impl Into<String>, already_absent: bool) -> Self {
        SagaEvent::CompensationStepCompleted(CompensationStepData {
            step_id: step_id.into(),
            already_absent,
        })
    }

    pub fn compensation_step_failed(
        step_id: impl Into<String>,
        error: impl ToString,
        kind: &str,
        attempts: u32,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_id: step_id.into(),
            error: error.to_string(),
            kind: kind.to_string(),
            attempts,
        })
    }

    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaFinishedData {
            finished_at: Utc::now(),
        })
    }

    pub fn saga_compensated() -> Self {
        SagaEvent::SagaCompensated(SagaFinishedData {
            finished_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}

/// An event together with the run it belongs to, as handed to emitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaEventEnvelope {
    pub saga_id: SagaId,
    pub saga_name: String,
    pub recorded_at: DateTime<Utc>,
    pub event: SagaEvent,
}

impl SagaEventEnvelope {
    pub fn new(saga_id: SagaId, saga_name: impl Into<String>, event: SagaEvent) -> Self {
        Self {
            saga_id,
            saga_name: saga_name.into(),
            recorded_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_step_id() {
        let completed = SagaEvent::step_completed(
            "register-application",
            ResourceId::new(),
            Some("loanApplicationId".into()),
            1,
        );
        assert_eq!(completed.event_type(), "StepCompleted");
        assert_eq!(completed.step_id(), Some("register-application"));

        let started = SagaEvent::saga_started("register-application");
        assert_eq!(started.event_type(), "SagaStarted");
        assert!(started.step_id().is_none());

        assert_eq!(
            SagaEvent::compensation_step_failed("register-party-1", "down", "transient", 3)
                .step_id(),
            Some("register-party-1")
        );
    }

    #[test]
    fn test_envelope_serializes_tagged_event() {
        let envelope = SagaEventEnvelope::new(
            SagaId::new(),
            "register-application",
            SagaEvent::step_failed("register-offer-1", "gateway timeout", "transient", 3),
        );

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event"]["type"], "StepFailed");
        assert_eq!(json["event"]["data"]["step_id"], "register-offer-1");
        assert_eq!(json["event"]["data"]["attempts"], 3);

        let back: SagaEventEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }
}
