//! Engine-side saga settings.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default per-attempt step timeout.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default time an emitter gets to accept one event.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default number of finished runs kept in memory.
pub const DEFAULT_RETAINED_RUNS: usize = 1000;

/// Timeouts, retry bounds and retention limits applied by the step
/// executor and the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaSettings {
    /// Per-attempt timeout for steps that do not declare their own.
    pub step_timeout: Duration,

    /// Retries of transient step failures.
    pub step_retry: RetryPolicy,

    /// Retries of transient compensation failures.
    pub compensation_retry: RetryPolicy,

    /// Time an emitter gets to accept one event before it is dropped.
    pub publish_timeout: Duration,

    /// Finished runs whose records are kept for lookup.
    pub retained_runs: usize,
}

impl Default for SagaSettings {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            step_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::default(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            retained_runs: DEFAULT_RETAINED_RUNS,
        }
    }
}

impl SagaSettings {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_step_retry(mut self, policy: RetryPolicy) -> Self {
        self.step_retry = policy;
        self
    }

    pub fn with_compensation_retry(mut self, policy: RetryPolicy) -> Self {
        self.compensation_retry = policy;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_retained_runs(mut self, runs: usize) -> Self {
        self.retained_runs = runs;
        self
    }
}
