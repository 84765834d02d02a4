//! In-memory page: a document of text and image nodes plus the fetcher that
//! loads its images.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use load_waiter::{LoadSignal, LoadState, ResourceSource, TrackedResource};
use network_intercept::{Fetcher, Request, Response};
use parking_lot::{Mutex, RwLock};
use storygate_core_types::{PageId, ResourceId};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use visual_snapshot::{encode_png, VisualError};

const PAGE_PADDING: u32 = 10;
const MIN_PAGE_WIDTH: u32 = 320;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PLACEHOLDER: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// An `<img>`-like element.
#[derive(Debug)]
pub struct ImageElement {
    id: ResourceId,
    src: String,
    width: Option<u32>,
    signal: Arc<LoadSignal>,
    body: Mutex<Option<Arc<[u8]>>>,
}

impl ImageElement {
    fn new(src: &str, width: Option<u32>) -> Self {
        Self {
            id: ResourceId::new(),
            src: src.to_string(),
            width,
            signal: LoadSignal::new(),
            body: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn state(&self) -> LoadState {
        self.signal.state()
    }

    pub fn signal(&self) -> &Arc<LoadSignal> {
        &self.signal
    }

    pub fn body(&self) -> Option<Arc<[u8]>> {
        self.body.lock().clone()
    }

    fn complete(&self, response: Response) {
        if !response.is_success() {
            warn!(src = %self.src, status = response.status, "image request failed");
            self.signal.mark_failed();
            return;
        }
        // a 2xx that is not an image fires `error`, not `load`
        if let Err(err) = image::guess_format(&response.body) {
            warn!(
                src = %self.src,
                content_type = response.header("Content-Type").unwrap_or("-"),
                error = %err,
                "response body is not an image"
            );
            self.signal.mark_failed();
            return;
        }
        *self.body.lock() = Some(response.body);
        self.signal.mark_loaded();
        debug!(src = %self.src, intercepted = response.intercepted, "image loaded");
    }

    fn tracked(&self) -> TrackedResource {
        TrackedResource {
            id: self.id,
            locator: self.src.clone(),
            signal: Arc::clone(&self.signal),
        }
    }
}

/// Handle to a mutable text node.
#[derive(Clone, Debug)]
pub struct TextHandle(Arc<RwLock<String>>);

impl TextHandle {
    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.0.write() = text.into();
    }
}

#[derive(Debug)]
enum Node {
    Text { tag: &'static str, text: TextHandle },
    Image(Arc<ImageElement>),
}

/// Ordered tree-less document: nodes render top to bottom.
#[derive(Debug, Default)]
pub struct Document {
    nodes: RwLock<Vec<Node>>,
}

impl Document {
    pub fn append_text(&self, tag: &'static str, text: impl Into<String>) -> TextHandle {
        let handle = TextHandle(Arc::new(RwLock::new(text.into())));
        self.nodes.write().push(Node::Text {
            tag,
            text: handle.clone(),
        });
        handle
    }

    fn append_image(&self, element: Arc<ImageElement>) {
        self.nodes.write().push(Node::Image(element));
    }

    /// Every image element currently present, in document order.
    pub fn images(&self) -> Vec<Arc<ImageElement>> {
        self.nodes
            .read()
            .iter()
            .filter_map(|node| match node {
                Node::Image(img) => Some(Arc::clone(img)),
                Node::Text { .. } => None,
            })
            .collect()
    }

    /// Text of all text nodes, one `tag: text` line per node.
    pub fn text_content(&self) -> String {
        self.nodes
            .read()
            .iter()
            .filter_map(|node| match node {
                Node::Text { tag, text } => Some(format!("{}: {}", tag, text.get())),
                Node::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ResourceSource for Document {
    fn snapshot(&self) -> Vec<TrackedResource> {
        self.images().iter().map(|img| img.tracked()).collect()
    }
}

/// A page hosting one mounted story.
pub struct Page {
    id: PageId,
    document: Arc<Document>,
    fetcher: Arc<Fetcher>,
    loads: Mutex<Vec<JoinHandle<()>>>,
}

impl Page {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            id: PageId::new(),
            document: Arc::new(Document::default()),
            fetcher,
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    /// Insert an image and start loading it.
    ///
    /// An intercepted request is answered before this returns, so the
    /// element is already complete; anything else loads in a background
    /// task. Must be called within a Tokio runtime.
    pub fn insert_image(&self, src: &str, width: Option<u32>) -> Arc<ImageElement> {
        let element = Arc::new(ImageElement::new(src, width));
        self.document.append_image(Arc::clone(&element));

        let request = Request::get(src);
        if let Some(response) = self.fetcher.try_intercept(&request) {
            element.complete(response);
            return element;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let target = Arc::clone(&element);
        let task = tokio::spawn(async move {
            match fetcher.send_uncached(&request).await {
                Ok(response) => target.complete(response),
                Err(err) => {
                    warn!(src = %target.src, error = %err, "image request failed");
                    target.signal.mark_failed();
                }
            }
        });
        self.loads.lock().push(task);
        element
    }

    /// Rasterize the whole document as PNG.
    ///
    /// Images are drawn at their declared width; ones that are not loaded (or
    /// cannot be decoded) show as a neutral placeholder. Text is not drawn.
    pub fn capture_full_page(&self) -> Result<Vec<u8>, VisualError> {
        let blocks: Vec<RgbaImage> = self
            .document
            .images()
            .iter()
            .map(|img| render_image(img))
            .collect();

        let content_width = blocks.iter().map(|b| b.width()).max().unwrap_or(0);
        let width = (content_width + 2 * PAGE_PADDING).max(MIN_PAGE_WIDTH);
        let height = blocks
            .iter()
            .map(|b| b.height() + PAGE_PADDING)
            .sum::<u32>()
            + PAGE_PADDING;

        let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
        let mut y = PAGE_PADDING;
        for block in &blocks {
            imageops::overlay(&mut canvas, block, PAGE_PADDING as i64, y as i64);
            y += block.height() + PAGE_PADDING;
        }

        encode_png(&DynamicImage::ImageRgba8(canvas))
    }

    /// Abort loads still in flight.
    pub fn close(&self) {
        for task in self.loads.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.close();
    }
}

fn render_image(element: &ImageElement) -> RgbaImage {
    let decoded = element
        .body()
        .filter(|_| element.state() == LoadState::Loaded)
        .and_then(|bytes| match image::load_from_memory(&bytes) {
            Ok(img) => Some(img),
            Err(err) => {
                warn!(src = %element.src(), error = %err, "image body could not be decoded");
                None
            }
        });

    match decoded {
        Some(img) => {
            let (natural_w, natural_h) = img.dimensions();
            let target_w = element.width().unwrap_or(natural_w).max(1);
            let target_h =
                ((natural_h as u64 * target_w as u64) / natural_w.max(1) as u64).max(1) as u32;
            imageops::resize(&img.to_rgba8(), target_w, target_h, FilterType::Triangle)
        }
        None => {
            let w = element.width().unwrap_or(150).max(1);
            RgbaImage::from_pixel(w, (w * 2 / 3).max(1), PLACEHOLDER)
        }
    }
}
