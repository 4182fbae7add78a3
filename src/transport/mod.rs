//! HTTP transport seam
//!
//! The engine talks to the network only through [`Transport`], so the batch
//! round-trip stays timeout-bounded and swappable in tests. [`HttpTransport`]
//! is the production implementation over `reqwest`.

use crate::utils::error::{BatchError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Outbound HTTP method. The batch protocol only ever needs these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// Raw response: status plus body bytes. Interpretation belongs to the
/// caller (codec or auth), not the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lossy text view of the body, for error detail.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns the raw response.
///
/// Connection and read failures surface as `Transport` errors; non-2xx
/// statuses are returned, not treated as errors, since per-entry semantics
/// live above this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BatchError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!(url = %request.url, method = ?request.method, "sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| BatchError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| BatchError::Transport(e.to_string()))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }
}
