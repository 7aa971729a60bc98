//! Processing Job Backend Abstraction
//!
//! The backend accepts batches of uploaded files as processing jobs, reports
//! per-job status snapshots, and serves the finished content items. The core
//! only observes the backend; it never assumes how jobs are executed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BridgeError, Result};
use crate::upload::UploadedFileRef;

/// Opaque backend job identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Polled snapshot of a backend job.
///
/// A closed set of states with the fields each state requires; payloads that
/// do not fit one of these shapes are rejected at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted but not started
    Pending { progress: Option<u8> },
    /// Running on the backend
    Processing { progress: Option<u8> },
    /// Finished; `result_id` identifies the produced content item
    Completed { result_id: String },
    /// Finished with an authoritative failure
    Failed { message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            JobStatus::Pending { progress } | JobStatus::Processing { progress } => *progress,
            JobStatus::Completed { .. } => Some(100),
            JobStatus::Failed { .. } => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending { .. } => "pending",
            JobStatus::Processing { .. } => "processing",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where burned-in captions are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Caption styling applied by the backend renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    pub font_family: String,
    pub font_size: u32,
    pub color: String,
    pub highlight_color: Option<String>,
    pub position: CaptionPosition,
    pub max_words_per_line: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 48,
            color: "#FFFFFF".to_string(),
            highlight_color: None,
            position: CaptionPosition::Bottom,
            max_words_per_line: 4,
        }
    }
}

/// Configuration attached to a submitted batch
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Caption rendering; `None` disables captions
    pub caption: Option<CaptionStyle>,
    /// Spoken language hint (BCP-47)
    pub language: Option<String>,
    /// Backend-specific options passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl JobConfig {
    pub fn with_caption(mut self, caption: CaptionStyle) -> Self {
        self.caption = Some(caption);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Reject configurations the backend could never accept
    pub fn validate(&self) -> Result<()> {
        if let Some(caption) = &self.caption {
            if caption.font_size == 0 {
                return Err(BridgeError::InvalidPayload(
                    "caption font size must be greater than 0".to_string(),
                ));
            }
            if caption.max_words_per_line == 0 {
                return Err(BridgeError::InvalidPayload(
                    "caption max words per line must be greater than 0".to_string(),
                ));
            }
        }
        if matches!(&self.language, Some(lang) if lang.trim().is_empty()) {
            return Err(BridgeError::InvalidPayload(
                "language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A finalized unit of generated content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Backend-assigned identity
    pub id: String,
    pub title: String,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Storage id of the upload this item was produced from
    pub source_file_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Job backend trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::jobs::{JobBackend, JobConfig};
///
/// async fn submit(backend: &dyn JobBackend, files: &[UploadedFileRef]) -> Result<()> {
///     let ids = backend.submit_batch(files, &JobConfig::default()).await?;
///     for id in ids {
///         println!("{}: {}", id, backend.job_status(&id).await?);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a batch; returns one job id per input file, in input order.
    ///
    /// The batch is accepted or rejected as a whole.
    async fn submit_batch(&self, files: &[UploadedFileRef], config: &JobConfig)
        -> Result<Vec<JobId>>;

    /// Query the current status of one job
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus>;

    /// Fetch the content item produced by a completed job
    async fn fetch_result(&self, result_id: &str) -> Result<ContentItem>;
}
