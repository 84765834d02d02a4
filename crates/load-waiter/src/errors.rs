//! Error types for load waiting

use thiserror::Error;

/// Ways a wait for tracked resources can end without every resource loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The enclosing timer fired before every tracked resource loaded
    #[error("timed out after {timeout_ms}ms with {pending} resource(s) still loading")]
    Timeout { timeout_ms: u64, pending: usize },

    /// A tracked resource reported a failed load (only under `FailurePolicy::FailFast`)
    #[error("resource failed to load: {locator}")]
    LoadFailed { locator: String },

    /// The caller cancelled the wait
    #[error("wait cancelled with {pending} resource(s) still loading")]
    Cancelled { pending: usize },
}

impl WaitError {
    /// Whether the timer fired before every resource loaded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}
