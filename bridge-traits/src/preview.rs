//! Transient Preview Handles
//!
//! Hosts expose user-selected files to their UI through short-lived handles:
//! object URLs in a browser, registry entries or temp files on desktop. The
//! core leases one handle per queued file and revokes it when the file leaves
//! the queue.

use std::fmt;

use crate::error::Result;
use crate::upload::LocalFile;

/// A live preview handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Preview handle factory trait
///
/// `create` allocates a host resource; `revoke` frees it. After `revoke` the
/// handle must not be dereferenced again.
pub trait PreviewFactory: Send + Sync {
    /// Allocate a preview handle for `file`
    fn create(&self, file: &LocalFile) -> Result<PreviewUrl>;

    /// Release a handle previously returned by `create`
    fn revoke(&self, url: &PreviewUrl);
}
