//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges carried by a
//! [`CoreConfig`] (HTTP client, preview factory) into the upload engine.
//! The Studio API connector is built over the HTTP client and handed to the
//! queue as both its upload endpoint and its job backend. Desktop apps
//! typically enable the `desktop-shims` feature so the config builder can
//! fall back to the `bridge-desktop` adapters.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::UploadService;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://studio.example.com/api")
//!     .api_token(token)
//!     .build()?;
//! let service = UploadService::bootstrap(config)?;
//!
//! let mut events = service.subscribe();
//! service.queue().enqueue(files)?;
//! let outcome = service.queue().start_upload(&JobConfig::default()).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{JobBackend, UploadEndpoint};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_upload::{QueueConfig, UploadQueue};
use provider_studio_api::StudioApiConnector;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct UploadService {
    queue: UploadQueue,
    event_bus: EventBus,
    api_base_url: Arc<str>,
}

impl UploadService {
    /// Build the engine from a validated configuration, talking to the
    /// Studio API at `config.api_base_url`.
    pub fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let mut connector =
            StudioApiConnector::new(config.http_client.clone(), config.api_base_url.clone());
        if let Some(token) = &config.api_token {
            connector = connector.with_token(token.clone());
        }
        let connector = Arc::new(connector);

        Ok(Self::with_backends(config, connector.clone(), connector))
    }

    /// Build the engine over caller-supplied remote seams. The config's HTTP
    /// client is not used.
    pub fn with_backends(
        config: CoreConfig,
        endpoint: Arc<dyn UploadEndpoint>,
        backend: Arc<dyn JobBackend>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let queue = UploadQueue::new(
            endpoint,
            backend,
            config.preview_factory.clone(),
            event_bus.clone(),
            QueueConfig::from_core(&config),
        );

        info!(
            api = %config.api_base_url,
            destination = %config.upload_destination,
            poll_interval_ms = config.polling.interval.as_millis() as u64,
            "Upload service ready"
        );

        Self {
            queue,
            event_bus,
            api_base_url: Arc::from(config.api_base_url.as_str()),
        }
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// New subscription to upload and content events
    pub fn subscribe(&self) -> EventStream {
        self.event_bus.stream()
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Abort in-flight uploads, stop polling and release every preview handle.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        if !self.queue.is_shut_down() {
            info!("Upload service shutting down");
        }
        self.queue.shutdown();
    }
}
