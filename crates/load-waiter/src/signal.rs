//! One-shot load notification with self-deregistering listeners

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::types::LoadState;

/// Load notification owned by a page element.
///
/// The element settles the signal exactly once; observers either see the
/// terminal state directly or get a [`Subscription`] that fires once. Both
/// happen under the same lock, so a settle can never slip between the state
/// check and the subscription.
#[derive(Debug)]
pub struct LoadSignal {
    inner: Mutex<SignalInner>,
}

#[derive(Debug)]
struct SignalInner {
    state: LoadState,
    next_id: u64,
    listeners: HashMap<u64, oneshot::Sender<LoadState>>,
}

/// Result of [`LoadSignal::observe`].
#[derive(Debug)]
pub enum Observation {
    /// Already terminal, nothing registered
    Settled(LoadState),

    /// Still pending, one listener registered
    Subscribed(Subscription),
}

impl LoadSignal {
    pub fn new() -> Arc<Self> {
        Self::with_state(LoadState::Pending)
    }

    /// A signal that is already loaded, e.g. an element served from cache.
    pub fn loaded() -> Arc<Self> {
        Self::with_state(LoadState::Loaded)
    }

    fn with_state(state: LoadState) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SignalInner {
                state,
                next_id: 0,
                listeners: HashMap::new(),
            }),
        })
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Return the terminal state, or register a one-shot listener.
    pub fn observe(self: &Arc<Self>) -> Observation {
        let mut inner = self.inner.lock();
        if inner.state.is_settled() {
            return Observation::Settled(inner.state);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = oneshot::channel();
        inner.listeners.insert(id, tx);
        Observation::Subscribed(Subscription {
            signal: Arc::downgrade(self),
            id,
            rx,
            finished: false,
        })
    }

    /// Settle as loaded. Returns `false` if the signal was already terminal.
    pub fn mark_loaded(&self) -> bool {
        self.settle(LoadState::Loaded)
    }

    /// Settle as failed. Returns `false` if the signal was already terminal.
    pub fn mark_failed(&self) -> bool {
        self.settle(LoadState::Failed)
    }

    fn settle(&self, state: LoadState) -> bool {
        let listeners = {
            let mut inner = self.inner.lock();
            if inner.state.is_settled() {
                return false;
            }
            inner.state = state;
            std::mem::take(&mut inner.listeners)
        };
        trace!(?state, listeners = listeners.len(), "load signal settled");
        for (_, tx) in listeners {
            // receiver may be mid-drop
            let _ = tx.send(state);
        }
        true
    }

    fn deregister(&self, id: u64) {
        self.inner.lock().listeners.remove(&id);
    }
}

/// A single registered listener.
///
/// Resolves with the terminal state once the signal settles. Dropping it
/// before then removes the listener from the signal.
#[derive(Debug)]
pub struct Subscription {
    signal: Weak<LoadSignal>,
    id: u64,
    rx: oneshot::Receiver<LoadState>,
    finished: bool,
}

impl Future for Subscription {
    type Output = LoadState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Pending;
        }
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(state)) => {
                this.finished = true;
                Poll::Ready(state)
            }
            // signal dropped without settling: the element is gone and will never load
            Poll::Ready(Err(_)) => {
                this.finished = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(signal) = self.signal.upgrade() {
            signal.deregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_fires_once_and_cleans_up() {
        let signal = LoadSignal::new();
        let sub = match signal.observe() {
            Observation::Subscribed(sub) => sub,
            other => panic!("expected subscription, got {:?}", other),
        };
        assert_eq!(signal.listener_count(), 1);

        assert!(signal.mark_loaded());
        assert_eq!(signal.listener_count(), 0);
        assert_eq!(sub.await, LoadState::Loaded);
    }

    #[test]
    fn settled_signal_registers_nothing() {
        let signal = LoadSignal::loaded();
        assert!(matches!(
            signal.observe(),
            Observation::Settled(LoadState::Loaded)
        ));
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let signal = LoadSignal::new();
        let first = signal.observe();
        let second = signal.observe();
        assert_eq!(signal.listener_count(), 2);

        drop(first);
        assert_eq!(signal.listener_count(), 1);
        drop(second);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn terminal_state_is_final() {
        let signal = LoadSignal::new();
        assert!(signal.mark_failed());
        assert!(!signal.mark_loaded());
        assert_eq!(signal.state(), LoadState::Failed);
    }
}
