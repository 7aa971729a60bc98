//! # Job Submission Gateway
//!
//! Registers a batch of uploaded files with the job backend. The batch is
//! accepted or rejected as a whole; on success the i-th returned handle
//! belongs to the i-th input file.

use crate::error::SubmissionError;
use bridge_traits::{JobBackend, JobConfig, JobId, UploadedFileRef};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Backend job accepted for one uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub job_id: JobId,
}

#[derive(Clone)]
pub struct JobSubmissionGateway {
    backend: Arc<dyn JobBackend>,
}

impl JobSubmissionGateway {
    pub fn new(backend: Arc<dyn JobBackend>) -> Self {
        Self { backend }
    }

    /// Submit `files` as one processing batch.
    ///
    /// An empty batch succeeds without contacting the backend. Any error
    /// means no job exists for any of the files.
    #[instrument(skip(self, files, config), fields(files = files.len()))]
    pub async fn submit_batch(
        &self,
        files: &[UploadedFileRef],
        config: &JobConfig,
    ) -> Result<Vec<JobHandle>, SubmissionError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        config
            .validate()
            .map_err(|e| SubmissionError::InvalidConfig(e.to_string()))?;

        let job_ids = self.backend.submit_batch(files, config).await.map_err(|e| {
            warn!(error = %e, "Batch submission rejected");
            SubmissionError::Rejected(e.to_string())
        })?;

        if job_ids.len() != files.len() {
            warn!(
                expected = files.len(),
                received = job_ids.len(),
                "Backend returned wrong number of job ids"
            );
            return Err(SubmissionError::Mismatch(format!(
                "expected {} job ids, received {}",
                files.len(),
                job_ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(job_ids.len());
        if let Some(duplicate) = job_ids.iter().find(|id| !seen.insert(*id)) {
            warn!(job_id = %duplicate, "Backend returned duplicate job id");
            return Err(SubmissionError::Mismatch(format!(
                "job id {} returned more than once",
                duplicate
            )));
        }

        info!(jobs = job_ids.len(), "Batch submitted");
        Ok(job_ids
            .into_iter()
            .map(|job_id| JobHandle { job_id })
            .collect())
    }
}
