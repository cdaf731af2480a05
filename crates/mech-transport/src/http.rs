//! HTTP transport

use crate::error::{TransportError, TransportResult};
use crate::request::{Completion, Request, Response};
use async_trait::async_trait;
use reqwest::{redirect, Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Maximum number of redirects followed for one logical request
const MAX_REDIRECTS: usize = 10;

/// Executes GET requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> TransportResult<Response>;
}

/// Thread-safe handle to a transport
pub type SharedTransport = Arc<dyn Transport>;

/// reqwest-backed transport
///
/// Redirects are followed by the client, which resubmits the same logical
/// request to the new location.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> TransportResult<Response> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Response { status, body })
    }
}

/// Run one request to completion
#[instrument(skip_all, fields(url = %request.url))]
pub async fn execute(transport: &dyn Transport, request: Request) -> Completion {
    let outcome = transport.get(&request.url).await;
    match &outcome {
        Ok(response) => debug!(status = response.status, "Request completed"),
        Err(e) => debug!(error = %e, "Request failed"),
    }
    Completion {
        context: request.context,
        outcome,
    }
}
