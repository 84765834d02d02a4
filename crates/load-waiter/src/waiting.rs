//! Snapshot-and-join waiting over tracked resources

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    errors::WaitError,
    signal::{Observation, Subscription},
    types::{FailurePolicy, LoadReport, LoadState, ResourceSource},
};

/// Snapshot `source` now and return the aggregate completion signal.
///
/// The snapshot is taken eagerly, before the returned value is ever awaited,
/// so resources added to the source afterwards are not tracked.
pub fn wait_for_loads<S>(source: &S, policy: FailurePolicy) -> PendingLoads
where
    S: ResourceSource + ?Sized,
{
    let started = Instant::now();
    let resources = source.snapshot();
    let tracked = resources.len();

    let mut pending = Vec::new();
    let mut already_settled = 0;
    let mut broken = 0;
    let mut early_failure = None;

    for resource in resources {
        match resource.signal.observe() {
            Observation::Settled(LoadState::Failed) => {
                already_settled += 1;
                broken += 1;
                if policy == FailurePolicy::FailFast && early_failure.is_none() {
                    early_failure = Some(resource.locator.clone());
                }
            }
            Observation::Settled(_) => already_settled += 1,
            Observation::Subscribed(subscription) => pending.push(PendingResource {
                locator: resource.locator,
                subscription,
            }),
        }
    }

    debug!(
        tracked,
        already_settled,
        awaiting = pending.len(),
        "snapshot of trackable resources taken"
    );

    PendingLoads {
        remaining: Arc::new(AtomicUsize::new(pending.len())),
        pending,
        tracked,
        already_settled,
        broken,
        early_failure,
        policy,
        started,
    }
}

struct PendingResource {
    locator: String,
    subscription: Subscription,
}

/// Aggregate completion signal for one snapshot.
///
/// Resolves once, when every subscribed resource has loaded. Dropping it (or
/// the future returned by [`PendingLoads::join`]) drops every outstanding
/// subscription, which deregisters the listeners.
#[must_use = "the wait does nothing unless joined"]
pub struct PendingLoads {
    pending: Vec<PendingResource>,
    remaining: Arc<AtomicUsize>,
    tracked: usize,
    already_settled: usize,
    broken: usize,
    early_failure: Option<String>,
    policy: FailurePolicy,
    started: Instant,
}

impl PendingLoads {
    /// Number of resources in the snapshot.
    pub fn tracked(&self) -> usize {
        self.tracked
    }

    /// Number of resources still loading.
    pub fn pending_count(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Shared counter of resources still loading; stays readable after the
    /// wait itself has been moved into a join.
    pub fn remaining_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.remaining)
    }

    /// Wait for every subscribed resource to load.
    ///
    /// Never resolves on its own if a resource never loads; impose a timeout
    /// (see [`crate::PollingStrategy`]) or use [`PendingLoads::join_until`].
    pub async fn join(self) -> Result<LoadReport, WaitError> {
        let PendingLoads {
            pending,
            remaining,
            tracked,
            already_settled,
            broken,
            early_failure,
            policy,
            started,
        } = self;

        if let Some(locator) = early_failure {
            return Err(WaitError::LoadFailed { locator });
        }

        let awaited = pending.len();
        let mut inflight: FuturesUnordered<_> = pending
            .into_iter()
            .map(|resource| async move {
                let PendingResource {
                    locator,
                    subscription,
                } = resource;
                let state = subscription.await;
                (locator, state)
            })
            .collect();

        let mut stalled = 0usize;
        while let Some((locator, state)) = inflight.next().await {
            match state {
                LoadState::Loaded => {
                    remaining.fetch_sub(1, Ordering::AcqRel);
                    debug!(%locator, "resource loaded");
                }
                LoadState::Failed if policy == FailurePolicy::FailFast => {
                    warn!(%locator, "resource failed to load");
                    return Err(WaitError::LoadFailed { locator });
                }
                LoadState::Failed | LoadState::Pending => {
                    warn!(%locator, "resource failed to load; no load notification will follow");
                    stalled += 1;
                }
            }
        }

        if stalled > 0 {
            // a failed resource never fires its load notification
            futures::future::pending::<()>().await;
        }

        Ok(LoadReport {
            tracked,
            already_settled,
            awaited,
            broken,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Like [`PendingLoads::join`], but gives up when `cancel` fires.
    pub async fn join_until(self, cancel: CancellationToken) -> Result<LoadReport, WaitError> {
        let remaining = self.remaining_handle();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let pending = remaining.load(Ordering::Acquire);
                debug!(pending, "wait cancelled");
                Err(WaitError::Cancelled { pending })
            }
            result = self.join() => result,
        }
    }
}

impl std::fmt::Debug for PendingLoads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLoads")
            .field("tracked", &self.tracked)
            .field("already_settled", &self.already_settled)
            .field("pending", &self.pending_count())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{signal::LoadSignal, types::TrackedResource};
    use std::time::Duration;

    fn resource(url: &str) -> TrackedResource {
        TrackedResource::new(url, LoadSignal::new())
    }

    #[tokio::test]
    async fn empty_snapshot_resolves_immediately() {
        let source: Vec<TrackedResource> = Vec::new();
        let report = wait_for_loads(&source, FailurePolicy::AwaitLoad)
            .join()
            .await
            .expect("empty join");
        assert_eq!(report.tracked, 0);
        assert_eq!(report.awaited, 0);
    }

    #[tokio::test]
    async fn already_complete_resources_register_no_listeners() {
        let source = vec![
            TrackedResource::new("a.jpg", LoadSignal::loaded()),
            TrackedResource::new("b.jpg", LoadSignal::loaded()),
        ];
        let wait = wait_for_loads(&source, FailurePolicy::AwaitLoad);
        for res in &source {
            assert_eq!(res.signal.listener_count(), 0);
        }
        let report = wait.join().await.expect("join");
        assert_eq!(report.already_settled, 2);
        assert_eq!(report.awaited, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_loads_do_not_resolve() {
        let source = vec![resource("a.jpg"), resource("b.jpg"), resource("c.jpg")];
        let wait = wait_for_loads(&source, FailurePolicy::AwaitLoad);
        let remaining = wait.remaining_handle();

        source[2].signal.mark_loaded();
        source[0].signal.mark_loaded();

        let outcome = tokio::time::timeout(Duration::from_secs(1), wait.join()).await;
        assert!(outcome.is_err(), "two of three loads must not resolve the join");
        assert_eq!(remaining.load(Ordering::Acquire), 1);
        // dropped by the timeout
        assert_eq!(source[1].signal.listener_count(), 0);
    }

    #[tokio::test]
    async fn resolves_regardless_of_order() {
        let source = vec![resource("a.jpg"), resource("b.jpg"), resource("c.jpg")];
        let wait = wait_for_loads(&source, FailurePolicy::AwaitLoad);

        for idx in [1usize, 2, 0] {
            source[idx].signal.mark_loaded();
        }

        let report = wait.join().await.expect("join");
        assert_eq!(report.awaited, 3);
    }

    #[tokio::test]
    async fn fail_fast_reports_the_broken_resource() {
        let source = vec![resource("ok.jpg"), resource("broken.jpg")];
        let wait = wait_for_loads(&source, FailurePolicy::FailFast);
        source[1].signal.mark_failed();

        let err = wait.join().await.expect_err("should fail");
        assert_eq!(
            err,
            WaitError::LoadFailed {
                locator: "broken.jpg".into()
            }
        );
    }

    #[tokio::test]
    async fn broken_before_snapshot_counts_as_complete_when_awaiting_load() {
        let broken = resource("broken.jpg");
        broken.signal.mark_failed();
        let report = wait_for_loads(&vec![broken], FailurePolicy::AwaitLoad)
            .join()
            .await
            .expect("join");
        assert_eq!(report.broken, 1);
        assert_eq!(report.already_settled, 1);
    }

    #[tokio::test]
    async fn cancellation_deregisters_listeners() {
        let source = vec![resource("a.jpg"), resource("b.jpg")];
        let wait = wait_for_loads(&source, FailurePolicy::AwaitLoad);
        assert_eq!(source[0].signal.listener_count(), 1);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = wait.join_until(cancel).await.expect_err("cancelled");
        assert_eq!(err, WaitError::Cancelled { pending: 2 });
        for res in &source {
            assert_eq!(res.signal.listener_count(), 0);
        }
    }
}
