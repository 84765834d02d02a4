use std::sync::Arc;
use std::time::Duration;

use network_intercept::{
    Fetcher, InterceptError, InterceptLayer, InterceptRule, MockAsset, OfflineTransport, Request,
    StaticTransport,
};

const REMOTE: &str = "https://wallpaperaccess.com/full/11729.jpg";

fn local_png() -> MockAsset {
    MockAsset::from_bytes(b"\x89PNG\r\n\x1a\nlocal-asset".to_vec())
}

#[tokio::test]
async fn intercepted_requests_never_reach_the_transport() {
    let layer = InterceptLayer::new();
    let transport = Arc::new(StaticTransport::new().route(
        REMOTE,
        "image/jpeg",
        b"remote".to_vec(),
        Duration::ZERO,
    ));
    let fetcher = Fetcher::new(Arc::clone(&layer), transport.clone());
    let _guard = layer.register(
        InterceptRule::get("https://wallpaperaccess.com/full/*.jpg", local_png()).unwrap(),
    );

    let response = fetcher.fetch(Request::get(REMOTE)).await.unwrap();
    assert!(response.intercepted);
    assert_eq!(response.header("Content-Type"), Some("image/png"));
    assert_eq!(transport.sent(), 0);
    assert_eq!(layer.snapshot().intercepted, 1);
}

#[tokio::test]
async fn unmatched_requests_fall_through_to_the_network() {
    let layer = InterceptLayer::new();
    let transport = Arc::new(StaticTransport::new().route(
        "https://example.com/full/1.jpg",
        "image/jpeg",
        b"remote".to_vec(),
        Duration::ZERO,
    ));
    let fetcher = Fetcher::new(Arc::clone(&layer), transport.clone());
    let _guard = layer.register(
        InterceptRule::get("https://wallpaperaccess.com/full/*.jpg", local_png()).unwrap(),
    );

    let response = fetcher
        .fetch(Request::get("https://example.com/full/1.jpg"))
        .await
        .unwrap();
    assert!(!response.intercepted);
    assert_eq!(&*response.body, b"remote");
    assert_eq!(transport.sent(), 1);
    assert_eq!(layer.snapshot().passthrough, 1);
}

#[tokio::test]
async fn offline_transport_refuses_passthrough() {
    let layer = InterceptLayer::new();
    let fetcher = Fetcher::new(layer, Arc::new(OfflineTransport));

    let err = fetcher.fetch(Request::get(REMOTE)).await.unwrap_err();
    assert!(matches!(err, InterceptError::Offline { .. }));
}

#[tokio::test]
async fn unknown_static_route_is_not_found() {
    let fetcher = Fetcher::new(InterceptLayer::new(), Arc::new(StaticTransport::new()));
    let response = fetcher
        .fetch(Request::get("https://nowhere.test/a.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}
