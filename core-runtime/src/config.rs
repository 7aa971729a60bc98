//! # Core Configuration Module
//!
//! Provides configuration management for the upload engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary bridges and settings. It enforces
//! fail-fast validation so that a misconfigured host learns about it at
//! startup rather than on the first upload.
//!
//! ## Required Settings
//!
//! - `api_base_url` - Root of the studio REST API
//!
//! ## Bridges (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `PreviewFactory` - Preview handles for picked files (desktop default: in-memory registry)
//!
//! When the `desktop-shims` feature is enabled, the desktop defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{ContentOrdering, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://studio.example.com/api")
//!     .api_token(std::env::var("STUDIO_TOKEN")?)
//!     .poll_interval_ms(2000)
//!     .max_consecutive_poll_misses(30)
//!     .content_ordering(ContentOrdering::NewestFirst)
//!     .http_client(Arc::new(MyHttpClient))
//!     .preview_factory(Arc::new(MyPreviewFactory))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, PreviewFactory};
use std::sync::Arc;
use std::time::Duration;

/// Interval between job status poll rounds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
const DEFAULT_UPLOAD_DESTINATION: &str = "uploads";
const DEFAULT_RESULT_FETCH_ATTEMPTS: u32 = 3;

/// Where newly completed content lands in the content list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentOrdering {
    /// Prepend (most recent first)
    #[default]
    NewestFirst,
    /// Append (oldest first)
    Append,
}

/// Job status polling policy.
///
/// Both caps are off by default: a job whose status keeps failing or that
/// never finishes is polled indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    pub interval: Duration,
    /// Consecutive failed status queries after which a job is given up
    pub max_consecutive_misses: Option<u32>,
    /// Time after tracking after which a non-terminal job is given up
    pub processing_timeout: Option<Duration>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_consecutive_misses: None,
            processing_timeout: None,
        }
    }
}

/// Core configuration for the upload engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Root URL of the studio API, without trailing slash
    pub api_base_url: String,

    /// Bearer token sent with every API call
    pub api_token: Option<String>,

    /// Storage path prefix uploads are written under
    pub upload_destination: String,

    pub polling: PollingSettings,

    /// Attempts made to fetch a completed job's content item
    pub result_fetch_attempts: u32,

    pub content_ordering: ContentOrdering,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,

    pub preview_factory: Arc<dyn PreviewFactory>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("upload_destination", &self.upload_destination)
            .field("polling", &self.polling)
            .field("result_fetch_attempts", &self.result_fetch_attempts)
            .field("content_ordering", &self.content_ordering)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("preview_factory", &"PreviewFactory { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The API URL is an http(s) URL
    /// - The upload destination is not blank
    /// - The poll interval lies within 1 ms to 60 s
    /// - Retry and buffer sizes are non-zero
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }

        if matches!(&self.api_token, Some(token) if token.trim().is_empty()) {
            return Err(Error::Config(
                "API token cannot be blank; omit it instead".to_string(),
            ));
        }

        if self.upload_destination.trim().is_empty() {
            return Err(Error::Config(
                "Upload destination cannot be empty".to_string(),
            ));
        }

        let interval_ms = self.polling.interval.as_millis();
        if interval_ms == 0 {
            return Err(Error::Config(
                "Poll interval must be greater than 0ms".to_string(),
            ));
        }
        if interval_ms > MAX_POLL_INTERVAL_MS as u128 {
            return Err(Error::Config(
                "Poll interval exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        if self.polling.max_consecutive_misses == Some(0) {
            return Err(Error::Config(
                "Max consecutive poll misses must be at least 1 when set".to_string(),
            ));
        }

        if matches!(self.polling.processing_timeout, Some(t) if t.is_zero()) {
            return Err(Error::Config(
                "Processing timeout must be greater than 0 when set".to_string(),
            ));
        }

        if self.result_fetch_attempts == 0 {
            return Err(Error::Config(
                "Result fetch attempts must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the studio API. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Embedded hosts: inject an HttpClient backed by the platform network stack."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn preview_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PreviewFactory".to_string(),
        message: "PreviewFactory implementation is required to lease preview handles for queued files. \
                 Desktop: enable the 'desktop-shims' feature to use the default BlobUrlRegistry. \
                 Web: inject a factory backed by object URLs."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_preview_factory() -> Result<Arc<dyn PreviewFactory>> {
    let factory: Arc<dyn PreviewFactory> = Arc::new(bridge_desktop::BlobUrlRegistry::new());
    Ok(factory)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_preview_factory() -> Result<Arc<dyn PreviewFactory>> {
    Err(preview_factory_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    api_token: Option<String>,
    upload_destination: Option<String>,
    poll_interval_ms: Option<u64>,
    max_consecutive_poll_misses: Option<u32>,
    processing_timeout_secs: Option<u64>,
    result_fetch_attempts: Option<u32>,
    content_ordering: ContentOrdering,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    preview_factory: Option<Arc<dyn PreviewFactory>>,
}

impl CoreConfigBuilder {
    /// Sets the API root URL. A trailing slash is trimmed.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the storage path prefix (default `"uploads"`).
    pub fn upload_destination(mut self, destination: impl Into<String>) -> Self {
        self.upload_destination = Some(destination.into());
        self
    }

    /// Sets the poll interval in milliseconds (default 2000).
    pub fn poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = Some(interval_ms);
        self
    }

    /// Give up on a job after this many consecutive failed status queries.
    pub fn max_consecutive_poll_misses(mut self, misses: u32) -> Self {
        self.max_consecutive_poll_misses = Some(misses);
        self
    }

    /// Give up on a job still processing this long after submission.
    pub fn processing_timeout_secs(mut self, secs: u64) -> Self {
        self.processing_timeout_secs = Some(secs);
        self
    }

    pub fn result_fetch_attempts(mut self, attempts: u32) -> Self {
        self.result_fetch_attempts = Some(attempts);
        self
    }

    pub fn content_ordering(mut self, ordering: ContentOrdering) -> Self {
        self.content_ordering = ordering;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn preview_factory(mut self, factory: Arc<dyn PreviewFactory>) -> Self {
        self.preview_factory = Some(factory);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when `api_base_url` is missing or a value is out of range
    /// - [`Error::CapabilityMissing`] when a bridge is missing and no desktop
    ///   default is available
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config(
                "API base URL is required. Use .api_base_url() to set it.".to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let preview_factory = match self.preview_factory {
            Some(factory) => factory,
            None => provide_default_preview_factory()?,
        };

        let config = CoreConfig {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_token: self.api_token,
            upload_destination: self
                .upload_destination
                .unwrap_or_else(|| DEFAULT_UPLOAD_DESTINATION.to_string()),
            polling: PollingSettings {
                interval: Duration::from_millis(
                    self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                max_consecutive_misses: self.max_consecutive_poll_misses,
                processing_timeout: self.processing_timeout_secs.map(Duration::from_secs),
            },
            result_fetch_attempts: self
                .result_fetch_attempts
                .unwrap_or(DEFAULT_RESULT_FETCH_ATTEMPTS),
            content_ordering: self.content_ordering,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            preview_factory,
        };

        config.validate()?;

        Ok(config)
    }
}
