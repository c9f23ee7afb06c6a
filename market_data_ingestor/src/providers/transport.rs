//! HTTP seam between a vendor client and the network.
//!
//! [`Transport`] performs one GET and reports either the raw status and body
//! or a [`TransportError`]. Turning those into a [`ProviderError`] is the
//! vendor client's job; the transport only separates connection refusals
//! from every other network failure.
//!
//! [`ProviderError`]: crate::providers::ProviderError

use std::time::Duration;

use async_trait::async_trait;
use snafu::ResultExt;
use thiserror::Error;

use crate::providers::{ClientBuildSnafu, ProviderInitError};

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Nothing is listening on the vendor endpoint.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Timeout, reset, DNS, body read or anything else.
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProviderInitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if is_connection_refused(&err) {
        TransportError::ConnectionRefused(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Walks the source chain looking for an OS-level refusal.
fn is_connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("connection refused") || text.contains("actively refused") {
            return true;
        }
        current = e.source();
    }
    false
}
