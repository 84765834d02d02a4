//! Visual Snapshot - baseline comparison for rendered stories
//!
//! This crate provides the visual-regression boundary of the harness:
//! - Baselines stored as `<dir>/<identifier>.png`
//! - Per-pixel diff with a percent or pixel-count failure threshold
//! - Diff images written to `<dir>/__diff_output__/` on mismatch

pub mod diff;
pub mod errors;
pub mod models;
pub mod store;

// Re-exports
pub use diff::{encode_png, VisualDiff};
pub use errors::VisualError;
pub use models::*;
pub use store::SnapshotStore;
