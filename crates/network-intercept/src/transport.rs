//! Network seam: transports and the intercept-first fetcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    http::{Request, Response},
    InterceptError, InterceptLayer,
};

/// Something that can actually deliver a request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, InterceptError>;
}

/// Consults the interception layer first and falls through to the transport.
pub struct Fetcher {
    layer: Arc<InterceptLayer>,
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    pub fn new(layer: Arc<InterceptLayer>, transport: Arc<dyn Transport>) -> Self {
        Self { layer, transport }
    }

    pub fn layer(&self) -> &Arc<InterceptLayer> {
        &self.layer
    }

    /// Answer `request` from the interception layer, if a rule matches.
    pub fn try_intercept(&self, request: &Request) -> Option<Response> {
        self.layer.resolve(request)
    }

    /// Send `request` over the transport, bypassing interception.
    pub async fn send_uncached(&self, request: &Request) -> Result<Response, InterceptError> {
        if self.layer.config().report_passthrough {
            info!(method = %request.method, url = %request.url, "request not intercepted; using network");
        } else {
            debug!(method = %request.method, url = %request.url, "request not intercepted; using network");
        }
        self.transport.send(request).await
    }

    pub async fn fetch(&self, request: Request) -> Result<Response, InterceptError> {
        match self.try_intercept(&request) {
            Some(response) => Ok(response),
            None => self.send_uncached(&request).await,
        }
    }
}

/// Refuses every request. Guarantees a run never touches the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn send(&self, request: &Request) -> Result<Response, InterceptError> {
        Err(InterceptError::Offline {
            url: request.url.clone(),
        })
    }
}

#[derive(Clone, Debug)]
struct StaticRoute {
    response: Response,
    latency: Duration,
}

/// In-memory transport keyed by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct StaticTransport {
    routes: DashMap<String, StaticRoute>,
    sent: AtomicU64,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with `content_type` for `url`, after `latency`.
    pub fn route(
        self,
        url: impl Into<String>,
        content_type: &str,
        body: impl Into<Vec<u8>>,
        latency: Duration,
    ) -> Self {
        let body: Vec<u8> = body.into();
        let response = Response::new(200, body.clone())
            .with_header("Content-Length", body.len().to_string())
            .with_header("Content-Type", content_type);
        self.routes.insert(url.into(), StaticRoute { response, latency });
        self
    }

    /// Answer `url` with an arbitrary status and empty body, after `latency`.
    pub fn status(self, url: impl Into<String>, status: u16, latency: Duration) -> Self {
        let response = Response::new(status, Vec::new());
        self.routes.insert(url.into(), StaticRoute { response, latency });
        self
    }

    /// Number of requests that reached this transport.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn send(&self, request: &Request) -> Result<Response, InterceptError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let route = self.routes.get(&request.url).map(|entry| entry.value().clone());
        match route {
            Some(route) => {
                if !route.latency.is_zero() {
                    tokio::time::sleep(route.latency).await;
                }
                Ok(route.response)
            }
            None => Ok(Response::new(404, Vec::new())),
        }
    }
}
