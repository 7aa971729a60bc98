//! Studio API connector implementation
//!
//! Implements `UploadEndpoint` and `JobBackend` against the Clip Studio REST API.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::jobs::{ContentItem, JobBackend, JobConfig, JobId, JobStatus};
use bridge_traits::upload::{LocalFile, TransferProgress, UploadEndpoint, UploadedFileRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::StudioApiError;
use crate::types::{
    ApiErrorBody, BatchRequest, BatchResponse, ContentPayload, JobStatusPayload, StoredFile,
};

/// Timeout for JSON calls; uploads carry no timeout of their own
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Studio API connector
///
/// One connector serves both the storage endpoint and the job endpoints, so
/// the queue can be handed the same `Arc` twice.
///
/// # Example
///
/// ```ignore
/// use provider_studio_api::StudioApiConnector;
///
/// let connector = Arc::new(StudioApiConnector::new(http_client, "https://api.clipstudio.dev/v1"));
/// let file_ref = connector.upload(&file, "uploads/footage", progress).await?;
/// let jobs = connector.submit_batch(&[file_ref], &JobConfig::default()).await?;
/// ```
pub struct StudioApiConnector {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    api_token: Option<String>,
}

impl StudioApiConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            api_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let request = HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json");
        match &self.api_token {
            Some(token) => request.bearer_token(token.clone()),
            None => request,
        }
    }

    /// Storage path for a file: destination prefix joined with the file name
    fn storage_path(destination: &str, file_name: &str) -> String {
        let prefix = destination.trim_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", prefix, file_name)
        }
    }

    /// Map a non-2xx response to a provider error
    fn check_status(
        response: HttpResponse,
        resource: &str,
    ) -> std::result::Result<HttpResponse, StudioApiError> {
        if response.is_success() {
            return Ok(response);
        }

        let status = response.status;
        let message = response
            .json::<ApiErrorBody>()
            .map(|body| body.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).trim().to_string());

        warn!(status, %resource, %message, "Studio API request rejected");

        Err(match status {
            401 | 403 => StudioApiError::AuthenticationFailed {
                status_code: status,
                message,
            },
            404 => StudioApiError::NotFound {
                resource: resource.to_string(),
            },
            429 => StudioApiError::RateLimitExceeded {
                retry_after_seconds: response
                    .headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("retry-after"))
                    .and_then(|(_, v)| v.trim().parse().ok())
                    .unwrap_or(1),
            },
            _ => StudioApiError::ApiError {
                status_code: status,
                message,
            },
        })
    }

    /// Send a JSON call exactly once. Batch submission is not idempotent, and
    /// the poller and the queue own the retry rules for status and results.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.http_client
            .execute_with_retry(request, RetryPolicy::none())
            .await
    }

    fn parse<T: serde::de::DeserializeOwned>(
        response: &HttpResponse,
    ) -> std::result::Result<T, StudioApiError> {
        serde_json::from_slice(&response.body).map_err(|e| StudioApiError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl UploadEndpoint for StudioApiConnector {
    #[instrument(skip(self, file, progress), fields(file = %file.name, size = file.size_bytes()))]
    async fn upload(
        &self,
        file: &LocalFile,
        destination: &str,
        progress: TransferProgress,
    ) -> Result<UploadedFileRef> {
        let path = Self::storage_path(destination, &file.name);
        let request = self
            .request(
                HttpMethod::Post,
                &format!("/storage/upload?path={}", urlencoding::encode(&path)),
            )
            .header("Content-Type", file.mime_type.clone())
            .body(file.data.clone());

        let response = self.http_client.upload(request, progress).await?;
        let response = Self::check_status(response, &path)?;
        let stored: StoredFile = Self::parse(&response)?;

        debug!(file_id = %stored.file_id, path = %stored.path, "Upload stored");
        Ok(stored.into())
    }
}

#[async_trait]
impl JobBackend for StudioApiConnector {
    #[instrument(skip(self, files, config), fields(files = files.len()))]
    async fn submit_batch(
        &self,
        files: &[UploadedFileRef],
        config: &JobConfig,
    ) -> Result<Vec<JobId>> {
        let request = self
            .request(HttpMethod::Post, "/jobs/batch")
            .timeout(REQUEST_TIMEOUT)
            .json(&BatchRequest::new(files, config))?;

        let response = self.send(request).await?;
        let response = Self::check_status(response, "jobs/batch")?;
        let batch: BatchResponse = Self::parse(&response)?;

        if batch.job_ids.len() != files.len() {
            return Err(StudioApiError::ParseError(format!(
                "batch returned {} job ids for {} files",
                batch.job_ids.len(),
                files.len()
            ))
            .into());
        }

        info!(jobs = batch.job_ids.len(), "Batch accepted");
        Ok(batch.job_ids.into_iter().map(JobId::new).collect())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatus> {
        let request = self
            .request(
                HttpMethod::Get,
                &format!("/jobs/{}", urlencoding::encode(job_id.as_str())),
            )
            .timeout(REQUEST_TIMEOUT);

        let response = self.send(request).await?;
        let response = Self::check_status(response, job_id.as_str())?;
        let payload: JobStatusPayload = Self::parse(&response)?;
        let status = JobStatus::try_from(payload)?;

        debug!(status = %status, "Job status");
        Ok(status)
    }

    #[instrument(skip(self), fields(result_id = %result_id))]
    async fn fetch_result(&self, result_id: &str) -> Result<ContentItem> {
        let request = self
            .request(
                HttpMethod::Get,
                &format!("/contents/{}", urlencoding::encode(result_id)),
            )
            .timeout(REQUEST_TIMEOUT);

        let response = self.send(request).await?;
        let response = Self::check_status(response, result_id)?;
        let payload: ContentPayload = Self::parse(&response)?;

        Ok(ContentItem::try_from(payload)?)
    }
}
