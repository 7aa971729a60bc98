//! # Host Bridge Traits
//!
//! Contracts between the upload engine and the services around it.
//!
//! ## Overview
//!
//! The engine never talks to a network, a storage bucket or a UI toolkit
//! directly. Each capability it needs is a trait here, implemented by the host
//! (`bridge-desktop`) or by an API provider crate (`provider-studio-api`).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry and upload progress
//! - [`UploadEndpoint`](upload::UploadEndpoint) - Cancellable, progress-reporting file upload
//! - [`JobBackend`](jobs::JobBackend) - Batch submission, status polling, result fetch
//!
//! ### Host resources
//! - [`PreviewFactory`](preview::PreviewFactory) - Transient preview handles for picked files
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should keep connection failures ([`BridgeError::Network`]) apart from
//! server rejections ([`BridgeError::HttpStatus`]) because the engine surfaces
//! them differently.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the engine shares them across
//! transport tasks and the poll loop.

pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod preview;
pub mod upload;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use jobs::{
    CaptionPosition, CaptionStyle, ContentItem, JobBackend, JobConfig, JobId, JobStatus,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use preview::{PreviewFactory, PreviewUrl};
pub use upload::{LocalFile, TransferProgress, UploadEndpoint, UploadedFileRef};
