//! Real network transport.

use std::time::Duration;

use async_trait::async_trait;
use network_intercept::{InterceptError, Request, Response, Transport};
use reqwest::{Client, Method, Url};
use tracing::debug;

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, InterceptError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| InterceptError::Transport {
                url: String::new(),
                message: format!("failed to build http client: {}", err),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<Response, InterceptError> {
        let url = Url::parse(&request.url).map_err(|err| InterceptError::InvalidUrl {
            url: request.url.clone(),
            reason: err.to_string(),
        })?;
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|err| InterceptError::Transport {
                url: request.url.clone(),
                message: err.to_string(),
            })?;

        let transport_err = |err: reqwest::Error| InterceptError::Transport {
            url: request.url.clone(),
            message: err.to_string(),
        };

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(transport_err)?;

        debug!(url = %request.url, status, len = body.len(), "network response");
        let mut out = Response::new(status, body.to_vec());
        out.headers = headers;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_rejected_before_sending() {
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport.send(&Request::get("not a url")).await.unwrap_err();
        assert!(matches!(err, InterceptError::InvalidUrl { .. }));
    }
}
