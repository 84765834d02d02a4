//! storygate library
//!
//! A small story harness for an image card. Each story mounts the card on an
//! in-memory page, optionally waits for its images (polling with a timeout)
//! or answers the image requests locally (interception), then compares a
//! full-page capture with a stored baseline.

pub mod component;
pub mod config;
pub mod errors;
pub mod page;
pub mod runner;
pub mod stories;
pub mod transport;

pub use component::{ImageCard, MountedImageCard};
pub use config::{load_configuration, HarnessConfig};
pub use errors::HarnessError;
pub use page::{Document, ImageElement, Page};
pub use runner::{PlayOutcome, RunSummary, StoryReport, StoryRunner};
pub use stories::{catalogue, PlayStep, Story};
pub use transport::HttpTransport;
