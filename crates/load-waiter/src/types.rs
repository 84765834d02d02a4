//! Core data types for load waiting

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storygate_core_types::ResourceId;

use crate::signal::LoadSignal;

/// Load state of a single trackable resource.
///
/// `Loaded` and `Failed` are terminal: once a signal leaves `Pending` it never
/// changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Fetch in flight (or never started)
    Pending,

    /// Body received and the load notification fired
    Loaded,

    /// Fetch failed or returned a non-success status
    Failed,
}

impl LoadState {
    /// Whether the resource is "complete" in the DOM sense: finished, either
    /// successfully or broken.
    pub fn is_settled(self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// How the waiter treats resources that fail to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A failure after the snapshot never produces a load notification, so
    /// the aggregate stays pending until the caller's timeout. Resources that
    /// were already broken at snapshot time count as complete.
    #[default]
    AwaitLoad,

    /// Any failed resource, before or after the snapshot, ends the wait with
    /// `WaitError::LoadFailed`.
    FailFast,
}

/// One resource handed to the waiter by a [`ResourceSource`] snapshot.
#[derive(Clone, Debug)]
pub struct TrackedResource {
    pub id: ResourceId,

    /// Source locator, e.g. the image URL
    pub locator: String,

    pub signal: Arc<LoadSignal>,
}

impl TrackedResource {
    pub fn new(locator: impl Into<String>, signal: Arc<LoadSignal>) -> Self {
        Self {
            id: ResourceId::new(),
            locator: locator.into(),
            signal,
        }
    }
}

/// Anything that can enumerate its trackable resources at a point in time.
///
/// Implementations return the resources present *now*; the waiter never asks
/// again, so resources added later are not tracked.
pub trait ResourceSource {
    fn snapshot(&self) -> Vec<TrackedResource>;
}

impl ResourceSource for [TrackedResource] {
    fn snapshot(&self) -> Vec<TrackedResource> {
        self.to_vec()
    }
}

impl ResourceSource for Vec<TrackedResource> {
    fn snapshot(&self) -> Vec<TrackedResource> {
        self.clone()
    }
}

impl<T> ResourceSource for Arc<T>
where
    T: ResourceSource + ?Sized,
{
    fn snapshot(&self) -> Vec<TrackedResource> {
        (**self).snapshot()
    }
}

/// Summary of a successful wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Resources present in the snapshot
    pub tracked: usize,

    /// Resources already complete at snapshot time (no listener registered)
    pub already_settled: usize,

    /// Resources the waiter subscribed to
    pub awaited: usize,

    /// Resources that were complete-but-broken at snapshot time
    pub broken: usize,

    /// Wall time from snapshot to resolution
    pub elapsed_ms: u64,
}
