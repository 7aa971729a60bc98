//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with streamed upload progress
//! - `PreviewFactory` as an in-memory `blob:` URL registry
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{BlobUrlRegistry, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://studio.example.com/api")
//!     .http_client(Arc::new(ReqwestHttpClient::new()))
//!     .preview_factory(Arc::new(BlobUrlRegistry::new()))
//!     .build()?;
//! ```

mod http;
mod preview;

pub use http::ReqwestHttpClient;
pub use preview::BlobUrlRegistry;
