//! # Queue Items
//!
//! One `QueueItem` follows a picked file from selection until it becomes
//! content or fails.
//!
//! ## State Machine
//!
//! ```text
//! Queued → Uploading → Processing → Completed
//!    │         │            │
//!    └─────────┴────────────┴─────→ Failed
//! ```
//!
//! Transitions only move forward. `Completed` and `Failed` are terminal. A
//! rejected transition leaves the item untouched.

use crate::error::{Result, UploadError};
use bridge_traits::{JobId, LocalFile, PreviewUrl};
use core_async::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Client-generated queue item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a queue item ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| UploadError::ItemNotFound(s.to_string()))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue item state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Selected, waiting for `start_upload`
    Queued,
    /// Transfer in flight
    Uploading,
    /// Backend job accepted, waiting for a terminal status
    Processing,
    Completed,
    Failed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the pipeline; terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Uploading => 1,
            Self::Processing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn can_transition_to(&self, to: ItemState) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Uploading)
                | (Self::Queued, Self::Failed)
                | (Self::Uploading, Self::Processing)
                | (Self::Uploading, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemState {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "uploading" => Ok(Self::Uploading),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(UploadError::InvalidStateTransition {
                from: "unknown".to_string(),
                to: s.to_string(),
                reason: "unrecognized state".to_string(),
            }),
        }
    }
}

/// One file from selection through completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    id: QueueItemId,
    filename: String,
    file_size_bytes: u64,
    state: ItemState,
    upload_progress_percent: u8,
    processing_progress: Option<u8>,
    error_message: Option<String>,
    #[serde(skip)]
    local_resource_handle: Option<PreviewUrl>,
    remote_job_id: Option<JobId>,
    created_at: i64,
    updated_at: i64,
}

impl QueueItem {
    /// A fresh `Queued` item for `file`, holding `handle` as its preview lease.
    pub fn new(id: QueueItemId, file: &LocalFile, handle: Option<PreviewUrl>) -> Self {
        let now = current_timestamp();
        Self {
            id,
            filename: file.name.clone(),
            file_size_bytes: file.size_bytes(),
            state: ItemState::Queued,
            upload_progress_percent: 0,
            processing_progress: None,
            error_message: None,
            local_resource_handle: handle,
            remote_job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> QueueItemId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn upload_progress_percent(&self) -> u8 {
        self.upload_progress_percent
    }

    pub fn processing_progress(&self) -> Option<u8> {
        self.processing_progress
    }

    /// Present only in `Failed`
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn local_resource_handle(&self) -> Option<&PreviewUrl> {
        self.local_resource_handle.as_ref()
    }

    pub fn remote_job_id(&self) -> Option<&JobId> {
        self.remote_job_id.as_ref()
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// `Queued → Uploading`
    pub fn begin_upload(&mut self) -> Result<()> {
        self.transition(ItemState::Uploading)
    }

    /// Record transfer progress.
    ///
    /// Values are clamped to 100 and never move backwards. Returns whether
    /// the stored percentage changed. Outside `Uploading` the call is
    /// rejected.
    pub fn record_upload_progress(&mut self, percent: u8) -> Result<bool> {
        if self.state != ItemState::Uploading {
            return Err(self.rejected("progress", "upload progress outside uploading"));
        }
        let percent = percent.min(100);
        if percent <= self.upload_progress_percent {
            return Ok(false);
        }
        self.upload_progress_percent = percent;
        self.touch();
        Ok(true)
    }

    /// `Uploading → Processing`, assigning the backend job.
    ///
    /// The job id is assigned at most once; both checks happen before any
    /// field changes.
    pub fn mark_processing(&mut self, job_id: JobId) -> Result<()> {
        if let Some(existing) = &self.remote_job_id {
            return Err(UploadError::JobAlreadyAssigned {
                item_id: self.id.to_string(),
                job_id: existing.to_string(),
            });
        }
        self.validate_transition(ItemState::Processing)?;
        self.remote_job_id = Some(job_id);
        self.state = ItemState::Processing;
        self.touch();
        Ok(())
    }

    /// Record backend progress while `Processing`. Same rules as upload progress.
    pub fn record_processing_progress(&mut self, percent: u8) -> Result<bool> {
        if self.state != ItemState::Processing {
            return Err(self.rejected("progress", "processing progress outside processing"));
        }
        let percent = percent.min(100);
        if matches!(self.processing_progress, Some(current) if percent <= current) {
            return Ok(false);
        }
        self.processing_progress = Some(percent);
        self.touch();
        Ok(true)
    }

    /// `Processing → Completed`
    pub fn complete(&mut self) -> Result<()> {
        self.transition(ItemState::Completed)?;
        self.processing_progress = Some(100);
        Ok(())
    }

    /// Any non-terminal state `→ Failed`
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(ItemState::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Drop the preview handle reference once its lease has been released.
    pub(crate) fn clear_resource_handle(&mut self) {
        self.local_resource_handle = None;
    }

    fn transition(&mut self, to: ItemState) -> Result<()> {
        self.validate_transition(to)?;
        self.state = to;
        self.touch();
        Ok(())
    }

    fn validate_transition(&self, to: ItemState) -> Result<()> {
        if self.state.can_transition_to(to) {
            return Ok(());
        }
        Err(UploadError::InvalidStateTransition {
            from: self.state.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: format!(
                "Cannot transition from {} to {}",
                self.state.as_str(),
                to.as_str()
            ),
        })
    }

    fn rejected(&self, to: &str, reason: &str) -> UploadError {
        UploadError::InvalidStateTransition {
            from: self.state.as_str().to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
