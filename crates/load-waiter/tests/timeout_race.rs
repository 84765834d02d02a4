use std::sync::Arc;
use std::time::Duration;

use load_waiter::{
    FailurePolicy, LoadSignal, PollingStrategy, ResourceSource, TrackedResource, WaitError,
};
use parking_lot::Mutex;

/// Source whose contents can change after a wait has started.
#[derive(Default)]
struct Gallery {
    items: Mutex<Vec<TrackedResource>>,
}

impl Gallery {
    fn add(&self, url: &str) -> Arc<LoadSignal> {
        let signal = LoadSignal::new();
        self.items
            .lock()
            .push(TrackedResource::new(url, Arc::clone(&signal)));
        signal
    }
}

impl ResourceSource for Gallery {
    fn snapshot(&self) -> Vec<TrackedResource> {
        self.items.lock().clone()
    }
}

fn load_after(signal: Arc<LoadSignal>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        signal.mark_loaded();
    });
}

#[tokio::test(start_paused = true)]
async fn resolves_when_loads_finish_before_timeout() {
    let gallery = Gallery::default();
    load_after(gallery.add("https://host/a.jpg"), Duration::from_millis(300));
    load_after(gallery.add("https://host/b.jpg"), Duration::from_millis(1200));

    let report = PollingStrategy::new(Duration::from_millis(5000))
        .run(&gallery)
        .await
        .expect("loads finish in time");
    assert_eq!(report.tracked, 2);
    assert_eq!(report.awaited, 2);
    assert!((1200..1202).contains(&report.elapsed_ms), "{}", report.elapsed_ms);
}

#[tokio::test(start_paused = true)]
async fn load_just_after_deadline_is_a_timeout() {
    let gallery = Gallery::default();
    let slow = gallery.add("https://host/slow.jpg");
    load_after(Arc::clone(&slow), Duration::from_millis(5001));

    let err = PollingStrategy::default()
        .run(&gallery)
        .await
        .expect_err("deadline passes first");
    assert_eq!(
        err,
        WaitError::Timeout {
            timeout_ms: 5000,
            pending: 1
        }
    );
    // the losing join is dropped together with its listener
    assert_eq!(slow.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn images_added_after_the_snapshot_are_ignored() {
    let gallery = Arc::new(Gallery::default());
    let first = gallery.add("https://host/first.jpg");

    let waiter = {
        let gallery = Arc::clone(&gallery);
        tokio::spawn(async move { PollingStrategy::default().run(&gallery).await })
    };
    // let the waiter take its snapshot
    tokio::time::sleep(Duration::from_millis(1)).await;

    // never loads, but was not part of the snapshot
    let _late = gallery.add("https://host/late.jpg");
    first.mark_loaded();

    let report = waiter.await.expect("join task").expect("first image loaded");
    assert_eq!(report.tracked, 1);
}

#[tokio::test(start_paused = true)]
async fn broken_image_surfaces_as_timeout_by_default() {
    let gallery = Gallery::default();
    let broken = gallery.add("https://host/404.jpg");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        broken.mark_failed();
    });

    let err = PollingStrategy::new(Duration::from_millis(500))
        .run(&gallery)
        .await
        .expect_err("never loads");
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn broken_image_fails_fast_when_requested() {
    let gallery = Gallery::default();
    let broken = gallery.add("https://host/404.jpg");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        broken.mark_failed();
    });

    let err = PollingStrategy::new(Duration::from_millis(500))
        .with_failure_policy(FailurePolicy::FailFast)
        .run(&gallery)
        .await
        .expect_err("fails fast");
    assert_eq!(
        err,
        WaitError::LoadFailed {
            locator: "https://host/404.jpg".into()
        }
    );
}
