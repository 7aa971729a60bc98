//! Studio API wire types
//!
//! Request and response bodies for the storage and job endpoints. Job status
//! payloads are converted into the closed [`JobStatus`] set; anything that
//! does not fit one of its shapes is rejected.

use bridge_traits::{ContentItem, JobConfig, JobStatus, UploadedFileRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StudioApiError;

/// `POST /storage/upload` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub file_id: String,
    pub path: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<StoredFile> for UploadedFileRef {
    fn from(file: StoredFile) -> Self {
        UploadedFileRef {
            file_id: file.file_id,
            path: file.path,
            url: file.url,
        }
    }
}

/// `POST /jobs/batch` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest<'a> {
    pub files: Vec<BatchFile<'a>>,
    pub config: &'a JobConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFile<'a> {
    pub file_id: &'a str,
    pub path: &'a str,
}

impl<'a> BatchRequest<'a> {
    pub fn new(files: &'a [UploadedFileRef], config: &'a JobConfig) -> Self {
        Self {
            files: files
                .iter()
                .map(|file| BatchFile {
                    file_id: &file.file_id,
                    path: &file.path,
                })
                .collect(),
            config,
        }
    }
}

/// `POST /jobs/batch` response; one id per submitted file, in order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub job_ids: Vec<String>,
}

/// `GET /jobs/{id}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusPayload {
    pub status: String,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub result_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TryFrom<JobStatusPayload> for JobStatus {
    type Error = StudioApiError;

    fn try_from(payload: JobStatusPayload) -> Result<Self, Self::Error> {
        let progress = match payload.progress {
            None => None,
            Some(p) if (0..=100).contains(&p) => Some(p as u8),
            Some(p) => {
                return Err(StudioApiError::InvalidStatus(format!(
                    "progress {} outside 0-100",
                    p
                )))
            }
        };

        match payload.status.as_str() {
            "pending" => Ok(JobStatus::Pending { progress }),
            "processing" => Ok(JobStatus::Processing { progress }),
            "completed" => match payload.result_id {
                Some(result_id) if !result_id.is_empty() => Ok(JobStatus::Completed { result_id }),
                _ => Err(StudioApiError::InvalidStatus(
                    "completed job without resultId".to_string(),
                )),
            },
            "failed" => Ok(JobStatus::Failed {
                message: payload
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "processing failed".to_string()),
            }),
            other => Err(StudioApiError::InvalidStatus(format!(
                "unknown job status \"{}\"",
                other
            ))),
        }
    }
}

/// `GET /contents/{id}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub source_file_id: Option<String>,
    /// RFC 3339
    pub created_at: String,
}

impl TryFrom<ContentPayload> for ContentItem {
    type Error = StudioApiError;

    fn try_from(payload: ContentPayload) -> Result<Self, Self::Error> {
        let created_at = DateTime::parse_from_rfc3339(&payload.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                StudioApiError::ParseError(format!(
                    "invalid createdAt \"{}\": {}",
                    payload.created_at, e
                ))
            })?;

        Ok(ContentItem {
            id: payload.id,
            title: payload.title,
            media_url: payload.media_url,
            thumbnail_url: payload.thumbnail_url,
            source_file_id: payload.source_file_id,
            created_at,
        })
    }
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(alias = "error")]
    pub message: String,
}
