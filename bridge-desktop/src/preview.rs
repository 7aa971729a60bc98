//! In-memory preview handle registry

use bridge_traits::{
    error::{BridgeError, Result},
    preview::{PreviewFactory, PreviewUrl},
    upload::LocalFile,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const URL_PREFIX: &str = "blob:clipstudio/";

/// Desktop stand-in for browser object URLs
///
/// Each `create` registers the file bytes under a fresh `blob:` URL so a UI
/// layer can resolve it for thumbnails. `revoke` drops the entry; revoking an
/// unknown or already revoked URL is ignored.
#[derive(Default)]
pub struct BlobUrlRegistry {
    entries: Mutex<HashMap<PreviewUrl, Bytes>>,
}

impl BlobUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a live URL to the bytes it was created from
    pub fn resolve(&self, url: &PreviewUrl) -> Option<Bytes> {
        self.lock().get(url).cloned()
    }

    pub fn contains(&self, url: &PreviewUrl) -> bool {
        self.lock().contains_key(url)
    }

    /// Number of URLs created and not yet revoked
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PreviewUrl, Bytes>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PreviewFactory for BlobUrlRegistry {
    fn create(&self, file: &LocalFile) -> Result<PreviewUrl> {
        if file.name.is_empty() {
            return Err(BridgeError::OperationFailed(
                "cannot create a preview for an unnamed file".to_string(),
            ));
        }

        let url = PreviewUrl::new(format!("{}{}", URL_PREFIX, Uuid::new_v4()));
        self.lock().insert(url.clone(), file.data.clone());
        debug!(url = %url, file = %file.name, "Created preview URL");
        Ok(url)
    }

    fn revoke(&self, url: &PreviewUrl) {
        if self.lock().remove(url).is_some() {
            debug!(url = %url, "Revoked preview URL");
        } else {
            warn!(url = %url, "Revoke requested for unknown preview URL");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> LocalFile {
        LocalFile::new(name, "video/mp4", Bytes::from_static(b"frames"))
    }

    #[test]
    fn test_create_registers_unique_urls() {
        let registry = BlobUrlRegistry::new();
        let a = registry.create(&file("a.mp4")).unwrap();
        let b = registry.create(&file("a.mp4")).unwrap();

        assert_ne!(a, b);
        assert!(a.as_str().starts_with(URL_PREFIX));
        assert_eq!(registry.live_count(), 2);
        assert_eq!(registry.resolve(&a), Some(Bytes::from_static(b"frames")));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let registry = BlobUrlRegistry::new();
        let url = registry.create(&file("clip.mov")).unwrap();

        registry.revoke(&url);
        registry.revoke(&url);

        assert!(!registry.contains(&url));
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_unnamed_file_rejected() {
        let registry = BlobUrlRegistry::new();
        assert!(registry.create(&file("")).is_err());
        assert_eq!(registry.live_count(), 0);
    }
}
