//! The image card under test.
//!
//! It renders a heading, the approach description, a status line and one
//! remote image. It knows nothing about how a story waits for the image.

use std::sync::Arc;

use load_waiter::{LoadState, Observation};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::page::{ImageElement, Page, TextHandle};

pub const IMAGE_URL: &str = "https://wallpaperaccess.com/full/11729.jpg";
pub const IMAGE_WIDTH: u32 = 300;

pub const HEADING: &str = "Handling image loading";
pub const CACHE_HINT: &str = "Remember to disable cache in the network panel while testing this!";
pub const LOADING_TEXT: &str = "Image is loading...";

/// Props of the image card.
#[derive(Clone, Debug, Default)]
pub struct ImageCard {
    pub description: Option<String>,
}

impl ImageCard {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    /// Render into `page`. The load timer starts here.
    pub fn mount(&self, page: &Page) -> MountedImageCard {
        let started = Instant::now();
        let document = page.document();

        document.append_text("h1", HEADING);
        document.append_text("h5", "Approach:");
        if let Some(description) = &self.description {
            document.append_text("div", description.clone());
        }
        document.append_text("small", CACHE_HINT);
        let status = document.append_text("p", LOADING_TEXT);
        let image = page.insert_image(IMAGE_URL, Some(IMAGE_WIDTH));

        let watcher = match image.signal().observe() {
            Observation::Settled(state) => {
                apply_status(&status, state, started);
                None
            }
            Observation::Subscribed(subscription) => {
                let status = status.clone();
                Some(tokio::spawn(async move {
                    let state = subscription.await;
                    apply_status(&status, state, started);
                }))
            }
        };

        MountedImageCard {
            image,
            status,
            watcher,
        }
    }
}

fn apply_status(status: &TextHandle, state: LoadState, started: Instant) {
    if state == LoadState::Loaded {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        status.set(loaded_text(elapsed_ms));
        debug!(elapsed_ms, "image card loaded");
    }
}

pub fn loaded_text(elapsed_ms: f64) -> String {
    format!("Image loaded in {:.2} ms", elapsed_ms)
}

/// A card rendered into a page.
pub struct MountedImageCard {
    image: Arc<ImageElement>,
    status: TextHandle,
    watcher: Option<JoinHandle<()>>,
}

impl MountedImageCard {
    pub fn image(&self) -> &Arc<ImageElement> {
        &self.image
    }

    pub fn status(&self) -> String {
        self.status.get()
    }

    pub fn is_loading(&self) -> bool {
        self.status() == LOADING_TEXT
    }

    /// Wait until the status line reflects a settled image.
    ///
    /// Returns at once while the image is still pending.
    pub async fn settle(&mut self) {
        if !self.image.state().is_settled() {
            return;
        }
        if let Some(watcher) = self.watcher.take() {
            if let Err(err) = watcher.await {
                debug!(error = %err, "status watcher ended early");
            }
        }
    }
}

impl Drop for MountedImageCard {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_intercept::{Fetcher, InterceptLayer, InterceptRule, MockAsset, StaticTransport};
    use std::time::Duration;

    fn page(transport: StaticTransport) -> (Page, Arc<InterceptLayer>) {
        let layer = InterceptLayer::new();
        let fetcher = Fetcher::new(Arc::clone(&layer), Arc::new(transport));
        (Page::new(Arc::new(fetcher)), layer)
    }

    #[test]
    fn loaded_text_has_two_decimals() {
        assert_eq!(loaded_text(12.3456), "Image loaded in 12.35 ms");
        assert_eq!(loaded_text(0.0), "Image loaded in 0.00 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn status_switches_when_image_loads() {
        let (page, _layer) = page(StaticTransport::new().route(
            IMAGE_URL,
            "image/png",
            b"\x89PNG\r\n\x1a\nbody".to_vec(),
            Duration::from_millis(250),
        ));
        let mut card = ImageCard::new("polling").mount(&page);
        assert!(card.is_loading());

        tokio::time::sleep(Duration::from_millis(300)).await;
        card.settle().await;
        assert_eq!(card.image().state(), LoadState::Loaded);
        let status = card.status();
        let elapsed: f64 = status
            .trim_start_matches("Image loaded in ")
            .trim_end_matches(" ms")
            .parse()
            .unwrap();
        assert!((250.0..252.0).contains(&elapsed), "{}", status);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_image_keeps_loading_text() {
        let (page, _layer) = page(StaticTransport::new().status(
            IMAGE_URL,
            500,
            Duration::from_millis(10),
        ));
        let card = ImageCard::default().mount(&page);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(card.image().state(), LoadState::Failed);
        assert!(card.is_loading());
    }

    #[tokio::test]
    async fn intercepted_image_is_loaded_at_mount() {
        let (page, layer) = page(StaticTransport::new());
        let _guard = layer.register(
            InterceptRule::get(
                "https://wallpaperaccess.com/full/*.jpg",
                MockAsset::from_bytes(b"\x89PNG\r\n\x1a\nbody".to_vec()),
            )
            .unwrap(),
        );
        let card = ImageCard::new("interception").mount(&page);

        assert!(!card.is_loading());
        assert!(card.status().starts_with("Image loaded in "));
        let text = page.document().text_content();
        assert!(text.contains("h1: Handling image loading"));
        assert!(text.contains("div: interception"));
    }
}
