//! # Studio API Provider
//!
//! REST implementation of the engine's remote contracts for the Clip Studio
//! API.
//!
//! ## Endpoints
//!
//! | Trait method | Request |
//! |---|---|
//! | [`UploadEndpoint::upload`](bridge_traits::UploadEndpoint::upload) | `POST /storage/upload?path=<destination>/<name>` |
//! | [`JobBackend::submit_batch`](bridge_traits::JobBackend::submit_batch) | `POST /jobs/batch` |
//! | [`JobBackend::job_status`](bridge_traits::JobBackend::job_status) | `GET /jobs/{id}` |
//! | [`JobBackend::fetch_result`](bridge_traits::JobBackend::fetch_result) | `GET /contents/{id}` |
//!
//! Non-2xx responses become [`BridgeError::HttpStatus`](bridge_traits::BridgeError::HttpStatus)
//! with the server's message; transport failures from the [`HttpClient`](bridge_traits::HttpClient)
//! pass through unchanged. Job status bodies outside the known set
//! (`pending`, `processing`, `completed`, `failed`) are rejected as
//! [`BridgeError::InvalidPayload`](bridge_traits::BridgeError::InvalidPayload).

pub mod connector;
pub mod error;
pub mod types;

pub use connector::StudioApiConnector;
pub use error::{Result, StudioApiError};
