//! Upload Endpoint Abstraction
//!
//! Describes the storage endpoint that receives user-selected files and hands
//! back a durable file reference.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Byte-level progress callback: `(bytes_sent, bytes_total)`.
pub type TransferProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A file picked by the user, held in memory until it is uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Server-assigned reference to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadedFileRef {
    /// Storage identifier assigned by the endpoint
    pub file_id: String,
    /// Full storage path (destination prefix plus file name)
    pub path: String,
    /// Public URL when the endpoint exposes one
    pub url: Option<String>,
}

/// Storage endpoint trait
///
/// Implementations stream `file` to `destination` and report byte progress
/// through `progress` as the body is written. Dropping the returned future
/// must stop the transfer; this is how callers abort an upload.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::upload::{LocalFile, UploadEndpoint};
///
/// async fn push(endpoint: &dyn UploadEndpoint, file: &LocalFile) -> Result<String> {
///     let progress = Arc::new(|sent, total| println!("{sent}/{total}"));
///     let reference = endpoint.upload(file, "uploads/footage", progress).await?;
///     Ok(reference.file_id)
/// }
/// ```
#[async_trait]
pub trait UploadEndpoint: Send + Sync {
    /// Upload one file
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Network`](crate::BridgeError::Network) when the
    ///   connection fails
    /// - [`BridgeError::HttpStatus`](crate::BridgeError::HttpStatus) when the
    ///   server rejects the file
    async fn upload(
        &self,
        file: &LocalFile,
        destination: &str,
        progress: TransferProgress,
    ) -> Result<UploadedFileRef>;
}
