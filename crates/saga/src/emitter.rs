//! Event emitters receiving saga lifecycle events.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use common::SagaId;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::events::SagaEventEnvelope;
use crate::settings::DEFAULT_RETAINED_RUNS;

/// Errors raised by an emitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("Event sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives saga lifecycle events for observability and auditing.
#[async_trait]
pub trait EventEmitter: Send + Sync + 'static {
    async fn publish(&self, envelope: &SagaEventEnvelope) -> Result<(), EmitError>;
}

/// Capacity of the queue between the saga path and the emitter.
pub const PUBLISH_QUEUE_CAPACITY: usize = 1024;

enum Queued {
    Event(SagaEventEnvelope),
    Flush(oneshot::Sender<()>),
}

/// Hands saga events to an emitter without waiting on it.
///
/// Events go through a bounded queue drained in order by a task spawned on
/// first use. An event is dropped when the queue is full, when the emitter
/// rejects it, or when the emitter does not answer within the publish
/// timeout. Drops are logged and counted; the run never sees them.
#[derive(Clone)]
pub struct EventPublisher {
    emitter: Arc<dyn EventEmitter>,
    timeout: Duration,
    sender: Arc<OnceLock<mpsc::Sender<Queued>>>,
}

impl EventPublisher {
    pub fn new(emitter: Arc<dyn EventEmitter>, timeout: Duration) -> Self {
        Self {
            emitter,
            timeout,
            sender: Arc::new(OnceLock::new()),
        }
    }

    /// Must be called from within a Tokio runtime.
    fn sender(&self) -> &mpsc::Sender<Queued> {
        self.sender.get_or_init(|| {
            let (sender, receiver) = mpsc::channel(PUBLISH_QUEUE_CAPACITY);
            tokio::spawn(deliver(Arc::clone(&self.emitter), self.timeout, receiver));
            sender
        })
    }

    /// Queues an event and returns immediately.
    pub fn publish(&self, envelope: SagaEventEnvelope) {
        let saga_id = envelope.saga_id;
        let event = envelope.event.event_type();
        if let Err(e) = self.sender().try_send(Queued::Event(envelope)) {
            publish_failed(saga_id, event, &e);
        }
    }

    /// Waits up to `wait` for every event queued so far to be handed to the
    /// emitter. Returns false if the wait ran out.
    pub async fn flush(&self, wait: Duration) -> bool {
        let sender = self.sender().clone();
        let (done, delivered) = oneshot::channel();
        let flushed = async move {
            sender.send(Queued::Flush(done)).await.ok()?;
            delivered.await.ok()
        };
        matches!(tokio::time::timeout(wait, flushed).await, Ok(Some(())))
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("timeout", &self.timeout)
            .field("started", &self.sender.get().is_some())
            .finish_non_exhaustive()
    }
}

async fn deliver(
    emitter: Arc<dyn EventEmitter>,
    timeout: Duration,
    mut receiver: mpsc::Receiver<Queued>,
) {
    while let Some(queued) = receiver.recv().await {
        match queued {
            Queued::Event(envelope) => {
                let event = envelope.event.event_type();
                match tokio::time::timeout(timeout, emitter.publish(&envelope)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => publish_failed(envelope.saga_id, event, &e),
                    Err(_) => publish_failed(
                        envelope.saga_id,
                        event,
                        &format!("no answer within {timeout:?}"),
                    ),
                }
            }
            Queued::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn publish_failed(saga_id: SagaId, event: &'static str, error: &dyn std::fmt::Display) {
    metrics::counter!("saga_audit_publish_failures_total").increment(1);
    tracing::warn!(%saga_id, event, %error, "failed to publish saga event");
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

#[async_trait]
impl EventEmitter for TracingEmitter {
    async fn publish(&self, envelope: &SagaEventEnvelope) -> Result<(), EmitError> {
        tracing::info!(
            saga_id = %envelope.saga_id,
            saga = %envelope.saga_name,
            event = envelope.event.event_type(),
            step = envelope.event.step_id().unwrap_or("-"),
            "saga event"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AuditState {
    runs: HashMap<SagaId, Vec<SagaEventEnvelope>>,
    /// Finished runs, oldest first.
    finished: VecDeque<SagaId>,
    fail_on_publish: bool,
}

/// Keeps published events in memory, per run and in arrival order.
///
/// Only the most recent `retained_runs` finished runs are kept; older ones
/// are evicted when another run finishes. Runs still in progress are never
/// evicted.
#[derive(Debug, Clone)]
pub struct InMemoryAuditSink {
    state: Arc<RwLock<AuditState>>,
    retained_runs: usize,
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::with_retained_runs(DEFAULT_RETAINED_RUNS)
    }
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retained_runs(retained_runs: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(AuditState::default())),
            retained_runs,
        }
    }

    /// Configures the sink to reject every publish.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Returns the events of one run, in arrival order.
    pub async fn events_for(&self, saga_id: SagaId) -> Vec<SagaEventEnvelope> {
        self.state
            .read()
            .await
            .runs
            .get(&saga_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the event types of one run, in arrival order.
    pub async fn event_types_for(&self, saga_id: SagaId) -> Vec<&'static str> {
        self.state
            .read()
            .await
            .runs
            .get(&saga_id)
            .map(|events| events.iter().map(|e| e.event.event_type()).collect())
            .unwrap_or_default()
    }

    /// Number of runs with at least one retained event.
    pub async fn run_count(&self) -> usize {
        self.state.read().await.runs.len()
    }

    /// Number of retained events across all runs.
    pub async fn len(&self) -> usize {
        self.state.read().await.runs.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.runs.is_empty()
    }
}

#[async_trait]
impl EventEmitter for InMemoryAuditSink {
    async fn publish(&self, envelope: &SagaEventEnvelope) -> Result<(), EmitError> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(EmitError::Unavailable("audit sink rejected event".into()));
        }
        state
            .runs
            .entry(envelope.saga_id)
            .or_default()
            .push(envelope.clone());

        if envelope.event.is_terminal() {
            state.finished.push_back(envelope.saga_id);
            while state.finished.len() > self.retained_runs {
                if let Some(evicted) = state.finished.pop_front() {
                    state.runs.remove(&evicted);
                }
            }
        }
        Ok(())
    }
}

/// Publishes to several emitters; one failing does not stop the others.
#[derive(Clone, Default)]
pub struct FanoutEmitter {
    emitters: Vec<Arc<dyn EventEmitter>>,
}

impl FanoutEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitters.push(emitter);
        self
    }
}

#[async_trait]
impl EventEmitter for FanoutEmitter {
    async fn publish(&self, envelope: &SagaEventEnvelope) -> Result<(), EmitError> {
        let mut failures = Vec::new();
        for emitter in &self.emitters {
            if let Err(e) = emitter.publish(envelope).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EmitError::Unavailable(failures.join("; ")))
        }
    }
}

impl std::fmt::Debug for FanoutEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutEmitter")
            .field("emitters", &self.emitters.len())
            .finish()
    }
}
