//! Image-load synchronization for story play steps
//!
//! This crate provides the two building blocks the harness uses to reach a
//! "ready" page before assertions and captures:
//! - [`wait_for_loads`]: snapshot every tracked resource of a page and join
//!   their one-shot load signals
//! - [`PollingStrategy`]: race that join against a timeout, dropping the loser
//! - [`LoadSignal`]: the one-shot, self-deregistering load notification that
//!   page elements expose

pub mod errors;
mod polling;
mod signal;
pub mod types;
mod waiting;

pub use errors::*;
pub use polling::*;
pub use signal::*;
pub use types::*;
pub use waiting::*;
