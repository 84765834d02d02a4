//! Timeout-bounded waiting for every trackable resource of a page

use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    errors::WaitError,
    types::{FailurePolicy, LoadReport, ResourceSource},
    waiting::wait_for_loads,
};

/// Default upper bound a play step waits for images.
pub const DEFAULT_PLAY_TIMEOUT_MS: u64 = 5000;

/// Wait for every resource of a source, failing after a fixed timeout.
///
/// Appropriate when requests cannot (or should not) be intercepted: the
/// page loads against the real network, and a slow or broken resource shows
/// up as a timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingStrategy {
    /// Upper bound for the whole wait (milliseconds)
    pub timeout_ms: u64,

    /// How failed loads are treated
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PollingStrategy {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_PLAY_TIMEOUT_MS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PollingStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Snapshot `source` and race the join against the timeout.
    pub async fn run<S>(&self, source: &S) -> Result<LoadReport, WaitError>
    where
        S: ResourceSource + ?Sized,
    {
        self.run_until(source, CancellationToken::new()).await
    }

    /// Like [`PollingStrategy::run`], with an external cancellation token.
    ///
    /// Whichever of {all loaded, timer elapsed, cancelled} happens first
    /// decides the outcome; the others are dropped, which deregisters every
    /// outstanding load listener and disarms the timer.
    pub async fn run_until<S>(
        &self,
        source: &S,
        cancel: CancellationToken,
    ) -> Result<LoadReport, WaitError>
    where
        S: ResourceSource + ?Sized,
    {
        let wait = wait_for_loads(source, self.failure_policy);
        let remaining = wait.remaining_handle();
        let tracked = wait.tracked();

        info!(
            tracked,
            timeout_ms = self.timeout_ms,
            "Waiting for resources to load"
        );

        let outcome = tokio::select! {
            biased;
            result = wait.join_until(cancel) => result,
            _ = sleep(self.timeout()) => Err(WaitError::Timeout {
                timeout_ms: self.timeout_ms,
                pending: remaining.load(Ordering::Acquire),
            }),
        };

        match &outcome {
            Ok(report) => info!(
                tracked,
                elapsed_ms = report.elapsed_ms,
                "All resources loaded"
            ),
            Err(err) => warn!(tracked, error = %err, "Resource wait ended without success"),
        }
        outcome
    }
}
