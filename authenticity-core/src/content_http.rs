//! HTTP content-store adapter.
//!
//! Talks to an IPFS-style API: `POST {base}/api/v0/cat?arg={hash}` returns the
//! published document. Products are published wrapped in an envelope
//! `{"type": "product", "product": {..}, "version": .., "timestamp": ..}`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::ports::ContentStore;
use crate::types::ProductSnapshot;

const SERVICE: &str = "content store";
const ENVELOPE_TYPE: &str = "product";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    product: ProductSnapshot,
}

pub struct HttpContentStore {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpContentStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building content store HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout {
                service: SERVICE.to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else {
            EngineError::unavailable(SERVICE, err)
        }
    }
}

/// Unwrap a published product envelope.
pub fn parse_envelope(body: &[u8]) -> Result<ProductSnapshot> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| EngineError::Malformed(format!("snapshot is not a product envelope: {e}")))?;
    if envelope.kind != ENVELOPE_TYPE {
        return Err(EngineError::Malformed(format!(
            "expected envelope type {ENVELOPE_TYPE:?}, got {:?}",
            envelope.kind
        )));
    }
    Ok(envelope.product)
}

/// Statuses meaning the store itself could not be reached. Any other error
/// status came from a node that answered.
fn is_gateway_failure(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// IPFS nodes answer a missing block with a 500 and a JSON error message.
fn classify_error_body(hash: &str, status: StatusCode, body: &str) -> EngineError {
    let preview: String = body.chars().take(200).collect();
    if preview.to_ascii_lowercase().contains("not found") {
        EngineError::NotFound(format!("snapshot {hash}: HTTP {status}: {preview}"))
    } else {
        EngineError::Malformed(format!("HTTP {status}: {preview}"))
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn fetch(&self, hash: &str) -> Result<ProductSnapshot> {
        let url = format!("{}/api/v0/cat", self.base_url);
        debug!(%url, hash, "fetching snapshot");

        let response = self
            .http
            .post(&url)
            .query(&[("arg", hash)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(format!("snapshot {hash}")));
        }
        if is_gateway_failure(status) {
            return Err(EngineError::unavailable(SERVICE, format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_body(hash, status, &body));
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        parse_envelope(&body)
    }
}
