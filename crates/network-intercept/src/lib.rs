//! Request interception for story runs.
//!
//! Rules are registered on an [`InterceptLayer`] before a component mounts.
//! Every outbound request goes through a [`Fetcher`], which answers matching
//! requests from a local [`MockAsset`] and lets everything else through to a
//! [`Transport`]. The layer also keeps intercepted/passthrough counters so a
//! run can tell whether it reached the network.

pub mod asset;
pub mod config;
pub mod http;
pub mod pattern;
pub mod transport;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::config::InterceptConfig;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use asset::MockAsset;
pub use http::{Request, Response};
pub use pattern::UrlPattern;
pub use transport::{Fetcher, OfflineTransport, StaticTransport, Transport};

/// Identifier of a registered rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors emitted by the interception surface and transports.
#[derive(Clone, Debug, Error)]
pub enum InterceptError {
    #[error("invalid url pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to read mock asset {path}: {source}")]
    Asset {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("network is disabled; refusing {url}")]
    Offline { url: String },
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

/// A pattern-match substitution for outbound requests.
#[derive(Clone, Debug)]
pub struct InterceptRule {
    pub method: String,
    pub pattern: UrlPattern,
    pub asset: MockAsset,
}

impl InterceptRule {
    pub fn new(method: &str, pattern: UrlPattern, asset: MockAsset) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            pattern,
            asset,
        }
    }

    /// Shorthand for a `GET` rule.
    pub fn get(pattern: &str, asset: MockAsset) -> Result<Self, InterceptError> {
        Ok(Self::new("GET", UrlPattern::parse(pattern)?, asset))
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.method.eq_ignore_ascii_case(&request.method) && self.pattern.matches(&request.url)
    }

    /// The substituted response: asset bytes with exact length and type headers.
    pub fn respond(&self, status: u16) -> Response {
        let mut response = Response::new(status, self.asset.shared_bytes())
            .with_header("Content-Length", self.asset.len().to_string())
            .with_header("Content-Type", self.asset.content_type());
        response.intercepted = true;
        response
    }
}

/// Cumulative counters exposed via pull-based API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptSnapshot {
    pub rules: usize,
    pub intercepted: u64,
    pub passthrough: u64,
}

struct RegisteredRule {
    rule: InterceptRule,
    seq: u64,
}

/// Test-scoped registry of interception rules.
pub struct InterceptLayer {
    rules: DashMap<RuleId, RegisteredRule>,
    next_seq: AtomicU64,
    intercepted: AtomicU64,
    passthrough: AtomicU64,
    config: InterceptConfig,
}

/// Keeps a rule registered; dropping it removes the rule.
#[must_use = "the rule is removed as soon as the guard is dropped"]
pub struct InterceptGuard {
    id: RuleId,
    layer: Weak<InterceptLayer>,
}

impl InterceptGuard {
    pub fn id(&self) -> RuleId {
        self.id
    }
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        if let Some(layer) = self.layer.upgrade() {
            layer.unregister(self.id);
        }
    }
}

impl InterceptLayer {
    pub fn new() -> Arc<Self> {
        Self::with_config(InterceptConfig::default())
    }

    pub fn with_config(config: InterceptConfig) -> Arc<Self> {
        Arc::new(Self {
            rules: DashMap::new(),
            next_seq: AtomicU64::new(0),
            intercepted: AtomicU64::new(0),
            passthrough: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    /// Register `rule`. Rules registered earlier win when several match.
    pub fn register(self: &Arc<Self>, rule: InterceptRule) -> InterceptGuard {
        let id = RuleId::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        info!(
            rule = %id.0,
            method = %rule.method,
            pattern = %rule.pattern,
            content_type = rule.asset.content_type(),
            len = rule.asset.len(),
            "Interception rule registered"
        );
        self.rules.insert(id, RegisteredRule { rule, seq });
        InterceptGuard {
            id,
            layer: Arc::downgrade(self),
        }
    }

    pub fn unregister(&self, id: RuleId) -> bool {
        let removed = self.rules.remove(&id).is_some();
        if removed {
            debug!(rule = %id.0, "Interception rule removed");
        }
        removed
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Substitute a response for `request`, or `None` to let it through.
    pub fn resolve(&self, request: &Request) -> Option<Response> {
        let hit = self
            .rules
            .iter()
            .filter(|entry| entry.value().rule.matches(request))
            .min_by_key(|entry| entry.value().seq)
            .map(|entry| (*entry.key(), entry.value().rule.respond(self.config.mock_status)));

        match hit {
            Some((id, response)) => {
                self.intercepted.fetch_add(1, Ordering::Relaxed);
                debug!(rule = %id.0, url = %request.url, len = response.body.len(), "request intercepted");
                Some(response)
            }
            None => {
                self.passthrough.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn snapshot(&self) -> InterceptSnapshot {
        InterceptSnapshot {
            rules: self.rules.len(),
            intercepted: self.intercepted.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_asset() -> MockAsset {
        MockAsset::from_bytes(b"\x89PNG\r\n\x1a\n0123456789".to_vec())
    }

    #[test]
    fn matching_request_gets_asset_with_exact_headers() {
        let layer = InterceptLayer::new();
        let asset = png_asset();
        let _guard = layer.register(
            InterceptRule::get("https://host/path/*.jpg", asset.clone()).expect("rule"),
        );

        let response = layer
            .resolve(&Request::get("https://host/path/example.jpg"))
            .expect("intercepted");
        assert_eq!(response.status, 200);
        assert!(response.intercepted);
        assert_eq!(&*response.body, asset.bytes());
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.header("Content-Length"), Some("18"));
    }

    #[test]
    fn different_host_or_method_passes_through() {
        let layer = InterceptLayer::new();
        let _guard =
            layer.register(InterceptRule::get("https://host/path/*.jpg", png_asset()).expect("rule"));

        assert!(layer
            .resolve(&Request::get("https://other/path/example.jpg"))
            .is_none());
        let post = Request {
            method: "POST".into(),
            url: "https://host/path/example.jpg".into(),
        };
        assert!(layer.resolve(&post).is_none());

        let snapshot = layer.snapshot();
        assert_eq!(snapshot.intercepted, 0);
        assert_eq!(snapshot.passthrough, 2);
    }

    #[test]
    fn dropping_guard_removes_rule() {
        let layer = InterceptLayer::new();
        let guard =
            layer.register(InterceptRule::get("https://host/*", png_asset()).expect("rule"));
        assert_eq!(layer.rule_count(), 1);
        drop(guard);
        assert_eq!(layer.rule_count(), 0);
        assert!(layer.resolve(&Request::get("https://host/a.jpg")).is_none());
    }

    #[test]
    fn earliest_registered_rule_wins() {
        let layer = InterceptLayer::new();
        let first = MockAsset::from_bytes(b"first".to_vec());
        let second = MockAsset::from_bytes(b"second".to_vec());
        let _a = layer.register(InterceptRule::get("https://host/*", first).expect("rule"));
        let _b = layer.register(InterceptRule::get("https://host/*.jpg", second).expect("rule"));

        let response = layer
            .resolve(&Request::get("https://host/x.jpg"))
            .expect("intercepted");
        assert_eq!(&*response.body, b"first");
    }
}
