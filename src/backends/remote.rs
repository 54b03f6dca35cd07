//! Remote segmentation backend
//!
//! Speaks the remove.bg wire contract: a multipart POST carrying the raw
//! image bytes and an `X-Api-Key` header; a successful response body is the
//! foreground already encoded with alpha (PNG). Any non-success status is
//! surfaced as an `Extraction` error carrying the status and body.

use crate::backends::SegmentationBackend;
use crate::error::{BgSwapError, Result};
use crate::types::AlphaMask;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default service endpoint
const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Bounded timeout so a slow extraction cannot hold a worker indefinitely
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Segmentation backend backed by a remote HTTP API
///
/// Holds a reusable HTTP client; construct once at process scope and share
/// across requests. The client serializes nothing — concurrent `segment`
/// calls run in parallel.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoteBackend {
    /// Create a backend with the default endpoint and timeout
    ///
    /// # Errors
    /// - Empty API key
    /// - HTTP client construction failure
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Create a backend builder
    pub fn builder<S: Into<String>>(api_key: S) -> RemoteBackendBuilder {
        RemoteBackendBuilder {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// The configured endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Decode a service response body into an alpha mask
    ///
    /// The service returns the cutout as an encoded image whose alpha
    /// channel is the segmentation result; only the alpha raster is kept,
    /// the subject color is taken from the original source downstream.
    fn mask_from_cutout_bytes(body: &[u8]) -> Result<AlphaMask> {
        let cutout = image::load_from_memory(body).map_err(|e| {
            BgSwapError::extraction(format!(
                "segmentation service returned an undecodable body: {}",
                e
            ))
        })?;

        let rgba = cutout.to_rgba8();
        let data = rgba.pixels().map(|p| p[3]).collect();
        Ok(AlphaMask::new(data, rgba.dimensions()))
    }
}

#[async_trait]
impl SegmentationBackend for RemoteBackend {
    async fn segment(&self, image_bytes: &[u8]) -> Result<AlphaMask> {
        log::debug!(
            "Requesting segmentation from {} ({} input bytes)",
            self.endpoint,
            image_bytes.len()
        );

        let part = reqwest::multipart::Part::bytes(image_bytes.to_vec())
            .file_name("image")
            .mime_str("application/octet-stream")
            .map_err(|e| {
                BgSwapError::extraction(format!("failed to build multipart body: {}", e))
            })?;
        let form = reqwest::multipart::Form::new()
            .part("image_file", part)
            .text("size", "auto")
            .text("format", "png");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                BgSwapError::extraction(format!("segmentation request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BgSwapError::service_status(
                status.as_u16(),
                &error_detail(&body),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            BgSwapError::extraction(format!("failed to read segmentation response: {}", e))
        })?;

        let mask = Self::mask_from_cutout_bytes(&body)?;
        log::debug!(
            "Segmentation response decoded: {}x{} mask",
            mask.dimensions.0,
            mask.dimensions.1
        );
        Ok(mask)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Extract a readable message from a service error body
///
/// The service reports errors as JSON (`{"errors": [{"title": ...}]}`);
/// anything else is carried through verbatim.
fn error_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        errors: Vec<ErrorEntry>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorEntry {
        title: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed
            .errors
            .into_iter()
            .map(|e| e.title)
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}

/// Builder for `RemoteBackend`
#[derive(Debug)]
pub struct RemoteBackendBuilder {
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl RemoteBackendBuilder {
    /// Override the service endpoint
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the backend
    ///
    /// # Errors
    /// - Empty API key
    /// - HTTP client construction failure
    pub fn build(self) -> Result<RemoteBackend> {
        if self.api_key.is_empty() {
            return Err(BgSwapError::invalid_config(
                "remote segmentation requires a non-empty API key",
            ));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                BgSwapError::extraction(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(RemoteBackend {
            client,
            endpoint: self.endpoint,
            api_key: self.api_key,
        })
    }
}
