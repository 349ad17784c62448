//! Saga execution records.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{ResourceId, SagaId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::events::SagaEvent;
use crate::settings::DEFAULT_RETAINED_RUNS;
use crate::state::SagaState;

/// A step that completed during a run, in completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub step_id: String,
    pub result: ResourceId,
}

/// State of one saga run, built by applying its events in order.
///
/// Only the orchestrator driving the run applies events to it; everyone
/// else reads snapshots from a [`SagaRecordStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaExecutionRecord {
    saga_id: SagaId,
    saga_name: String,
    state: SagaState,
    completed_steps: Vec<CompletedStep>,
    failed_steps: Vec<String>,
    compensated_steps: Vec<String>,
    failed_compensations: Vec<String>,
    retries: u32,
    /// The root cause, once a step has failed.
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl SagaExecutionRecord {
    pub fn new(saga_id: SagaId) -> Self {
        Self {
            saga_id,
            saga_name: String::new(),
            state: SagaState::Pending,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            compensated_steps: Vec::new(),
            failed_compensations: Vec::new(),
            retries: 0,
            failure_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Rebuilds a record from its event history.
    pub fn replay<'a>(saga_id: SagaId, events: impl IntoIterator<Item = &'a SagaEvent>) -> Self {
        let mut record = Self::new(saga_id);
        for event in events {
            record.apply(event);
        }
        record
    }

    pub fn apply(&mut self, event: &SagaEvent) {
        match event {
            SagaEvent::SagaStarted(data) => {
                self.saga_name = data.saga_name.clone();
                self.started_at = Some(data.started_at);
                self.state = SagaState::Running;
            }
            // Retries are counted from the attempts on the final step event.
            SagaEvent::StepStarted(_) | SagaEvent::StepRetried(_) => {}
            SagaEvent::StepCompleted(data) => {
                self.retries += data.attempts.saturating_sub(1);
                self.completed_steps.push(CompletedStep {
                    step_id: data.step_id.clone(),
                    result: data.result,
                });
            }
            SagaEvent::StepFailed(data) => {
                self.retries += data.attempts.saturating_sub(1);
                self.failed_steps.push(data.step_id.clone());
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(data.error.clone());
                }
            }
            SagaEvent::CompensationStarted(data) => {
                self.state = SagaState::Compensating;
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(data.cause.clone());
                }
            }
            SagaEvent::CompensationStepCompleted(data) => {
                self.compensated_steps.push(data.step_id.clone());
            }
            SagaEvent::CompensationStepFailed(data) => {
                self.failed_compensations.push(data.step_id.clone());
            }
            SagaEvent::SagaCompleted(data) => {
                self.state = SagaState::Completed;
                self.finished_at = Some(data.finished_at);
            }
            SagaEvent::SagaCompensated(data) => {
                self.state = SagaState::Compensated;
                self.finished_at = Some(data.finished_at);
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.finished_at = Some(data.failed_at);
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(data.reason.clone());
                }
            }
        }
    }
}

// Query methods
impl SagaExecutionRecord {
    pub fn saga_id(&self) -> SagaId {
        self.saga_id
    }

    pub fn saga_name(&self) -> &str {
        &self.saga_name
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the completed steps in completion order.
    pub fn completed_steps(&self) -> &[CompletedStep] {
        &self.completed_steps
    }

    /// Returns the result of a completed step.
    pub fn result_of(&self, step_id: &str) -> Option<ResourceId> {
        self.completed_steps
            .iter()
            .find(|s| s.step_id == step_id)
            .map(|s| s.result)
    }

    pub fn failed_steps(&self) -> &[String] {
        &self.failed_steps
    }

    /// Returns the undone steps, in the order they were undone.
    pub fn compensated_steps(&self) -> &[String] {
        &self.compensated_steps
    }

    pub fn failed_compensations(&self) -> &[String] {
        &self.failed_compensations
    }

    /// Returns the number of step attempts that were retried.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<SagaId, SagaExecutionRecord>,
    /// Finished runs, oldest first.
    finished: VecDeque<SagaId>,
}

/// Latest snapshot of each run's record, by saga ID.
///
/// Keeps every run in progress and the most recent `retained_runs`
/// finished ones.
#[derive(Debug, Clone)]
pub struct SagaRecordStore {
    state: Arc<RwLock<StoreState>>,
    retained_runs: usize,
}

impl Default for SagaRecordStore {
    fn default() -> Self {
        Self::with_retained_runs(DEFAULT_RETAINED_RUNS)
    }
}

impl SagaRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retained_runs(retained_runs: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            retained_runs,
        }
    }

    pub async fn put(&self, record: &SagaExecutionRecord) {
        let mut state = self.state.write().await;
        let saga_id = record.saga_id();
        let previous = state.records.insert(saga_id, record.clone());
        let finished_now = record.state().is_terminal()
            && !previous.is_some_and(|p| p.state().is_terminal());
        if !finished_now {
            return;
        }

        state.finished.push_back(saga_id);
        while state.finished.len() > self.retained_runs {
            if let Some(evicted) = state.finished.pop_front() {
                state.records.remove(&evicted);
            }
        }
    }

    pub async fn get(&self, saga_id: SagaId) -> Option<SagaExecutionRecord> {
        self.state.read().await.records.get(&saga_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }
}
