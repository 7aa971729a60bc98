//! Scripted fakes for the upload engine's host seams.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, ContentItem, JobBackend, JobConfig, JobId, JobStatus, LocalFile,
    PreviewFactory, PreviewUrl, TransferProgress, UploadEndpoint, UploadedFileRef,
};
use bytes::Bytes;
use chrono::Utc;
use core_runtime::events::{ContentEvent, CoreEvent, EventBus, EventStream, UploadEvent};
use core_upload::{QueueConfig, UploadQueue};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FILE_SIZE: usize = 1000;

pub fn file(name: &str) -> LocalFile {
    LocalFile::new(name, "video/mp4", Bytes::from(vec![7u8; FILE_SIZE]))
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ============================================================================
// Upload endpoint
// ============================================================================

#[derive(Clone)]
pub enum UploadScript {
    /// Report each `(sent, total)` step, then succeed
    Succeed(Vec<(u64, u64)>),
    FailNetwork(String),
    FailServer(u16),
    /// Report each step, then never finish
    Hang(Vec<(u64, u64)>),
}

struct DropMarker {
    name: String,
    dropped: Arc<Mutex<HashSet<String>>>,
}

impl Drop for DropMarker {
    fn drop(&mut self) {
        self.dropped.lock().unwrap().insert(self.name.clone());
    }
}

#[derive(Default)]
pub struct FakeEndpoint {
    scripts: Mutex<HashMap<String, UploadScript>>,
    callbacks: Mutex<HashMap<String, TransferProgress>>,
    dropped: Arc<Mutex<HashSet<String>>>,
    started: Mutex<Vec<String>>,
}

impl FakeEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, name: &str, script: UploadScript) {
        self.scripts.lock().unwrap().insert(name.to_string(), script);
    }

    /// Invoke the progress callback the transport handed out for `name`.
    pub fn fire_progress(&self, name: &str, sent: u64, total: u64) {
        let callback = self.callbacks.lock().unwrap().get(name).cloned();
        if let Some(callback) = callback {
            callback(sent, total);
        }
    }

    /// Whether the upload future for `name` was dropped
    pub fn was_dropped(&self, name: &str) -> bool {
        self.dropped.lock().unwrap().contains(name)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadEndpoint for FakeEndpoint {
    async fn upload(
        &self,
        file: &LocalFile,
        destination: &str,
        progress: TransferProgress,
    ) -> bridge_traits::error::Result<UploadedFileRef> {
        let _marker = DropMarker {
            name: file.name.clone(),
            dropped: Arc::clone(&self.dropped),
        };
        self.started.lock().unwrap().push(file.name.clone());
        self.callbacks
            .lock()
            .unwrap()
            .insert(file.name.clone(), Arc::clone(&progress));

        let total = file.size_bytes();
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&file.name)
            .cloned()
            .unwrap_or_else(|| UploadScript::Succeed(vec![(total / 2, total), (total, total)]));

        match script {
            UploadScript::Succeed(steps) => {
                for (sent, total) in steps {
                    progress(sent, total);
                    tokio::task::yield_now().await;
                }
                Ok(UploadedFileRef {
                    file_id: format!("file-{}", file.name),
                    path: format!("{}/{}", destination, file.name),
                    url: None,
                })
            }
            UploadScript::FailNetwork(message) => Err(BridgeError::Network(message)),
            UploadScript::FailServer(status) => Err(BridgeError::HttpStatus {
                status,
                message: "storage rejected the file".to_string(),
            }),
            UploadScript::Hang(steps) => {
                for (sent, total) in steps {
                    progress(sent, total);
                    tokio::task::yield_now().await;
                }
                futures::future::pending().await
            }
        }
    }
}

// ============================================================================
// Job backend
// ============================================================================

pub fn completed(result_id: &str) -> Result<JobStatus, String> {
    Ok(JobStatus::Completed {
        result_id: result_id.to_string(),
    })
}

pub fn failed(message: &str) -> Result<JobStatus, String> {
    Ok(JobStatus::Failed {
        message: message.to_string(),
    })
}

pub fn processing(progress: Option<u8>) -> Result<JobStatus, String> {
    Ok(JobStatus::Processing { progress })
}

pub fn unreachable_status(message: &str) -> Result<JobStatus, String> {
    Err(message.to_string())
}

/// Job backend with scripted responses.
///
/// Unscripted batches get one `job-<file id>` per file. Unscripted jobs
/// complete at once with `result-<job id>`. A status script's last entry
/// repeats. Results are content items whose id is the result id.
#[derive(Default)]
pub struct FakeBackend {
    submit: Mutex<Option<Result<Vec<JobId>, String>>>,
    submitted: Mutex<Vec<Vec<UploadedFileRef>>>,
    statuses: Mutex<HashMap<JobId, VecDeque<Result<JobStatus, String>>>>,
    status_calls: Mutex<Vec<JobId>>,
    fetch_failures: Mutex<HashMap<String, u32>>,
    fetch_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept_as(&self, job_ids: &[&str]) {
        *self.submit.lock().unwrap() = Some(Ok(job_ids.iter().map(|id| JobId::from(*id)).collect()));
    }

    pub fn reject_batch(&self, message: &str) {
        *self.submit.lock().unwrap() = Some(Err(message.to_string()));
    }

    pub fn script_status(&self, job_id: &str, steps: Vec<Result<JobStatus, String>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(JobId::from(job_id), steps.into());
    }

    /// Fail the next `times` fetches of `result_id`.
    pub fn fail_fetch(&self, result_id: &str, times: u32) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(result_id.to_string(), times);
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn submitted_batches(&self) -> Vec<Vec<UploadedFileRef>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn status_calls_for(&self, job_id: &str) -> usize {
        let job_id = JobId::from(job_id);
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == job_id)
            .count()
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.lock().unwrap().len()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn submit_batch(
        &self,
        files: &[UploadedFileRef],
        _config: &JobConfig,
    ) -> bridge_traits::error::Result<Vec<JobId>> {
        self.submitted.lock().unwrap().push(files.to_vec());
        match self.submit.lock().unwrap().clone() {
            Some(Ok(ids)) => Ok(ids),
            Some(Err(message)) => Err(BridgeError::HttpStatus {
                status: 422,
                message,
            }),
            None => Ok(files
                .iter()
                .map(|f| JobId::new(format!("job-{}", f.file_id)))
                .collect()),
        }
    }

    async fn job_status(&self, job_id: &JobId) -> bridge_traits::error::Result<JobStatus> {
        self.status_calls.lock().unwrap().push(job_id.clone());
        let step = {
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.get_mut(job_id) {
                Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
                Some(steps) => steps.front().cloned().unwrap(),
                None => completed(&format!("result-{}", job_id)),
            }
        };
        step.map_err(BridgeError::Network)
    }

    async fn fetch_result(&self, result_id: &str) -> bridge_traits::error::Result<ContentItem> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.fetch_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(result_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BridgeError::Network("result store unavailable".to_string()));
                }
            }
        }
        Ok(content(result_id))
    }
}

pub fn content(id: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: format!("Clip {}", id),
        media_url: Some(format!("https://cdn.example.com/{}.mp4", id)),
        thumbnail_url: None,
        source_file_id: None,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Preview handles
// ============================================================================

#[derive(Default)]
pub struct CountingPreviews {
    created: AtomicUsize,
    revoked: Mutex<Vec<PreviewUrl>>,
}

impl CountingPreviews {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> Vec<PreviewUrl> {
        self.revoked.lock().unwrap().clone()
    }

    /// Handles created and not yet revoked
    pub fn live(&self) -> usize {
        self.created() - self.revoked.lock().unwrap().len()
    }

    /// Every revoked handle was revoked exactly once
    pub fn no_double_revoke(&self) -> bool {
        let revoked = self.revoked.lock().unwrap();
        let unique: HashSet<&PreviewUrl> = revoked.iter().collect();
        unique.len() == revoked.len()
    }
}

impl PreviewFactory for CountingPreviews {
    fn create(&self, file: &LocalFile) -> bridge_traits::error::Result<PreviewUrl> {
        if file.name.starts_with("unreadable") {
            return Err(BridgeError::OperationFailed("cannot read file".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(PreviewUrl::new(format!("blob:test/{}", n)))
    }

    fn revoke(&self, url: &PreviewUrl) {
        self.revoked.lock().unwrap().push(url.clone());
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub endpoint: Arc<FakeEndpoint>,
    pub backend: Arc<FakeBackend>,
    pub previews: Arc<CountingPreviews>,
    pub queue: UploadQueue,
    pub events: EventStream,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        let endpoint = FakeEndpoint::new();
        let backend = FakeBackend::new();
        let previews = CountingPreviews::new();
        let bus = EventBus::new(256);
        let events = bus.stream();
        let queue = UploadQueue::new(
            endpoint.clone(),
            backend.clone(),
            previews.clone(),
            bus,
            config,
        );
        Self {
            endpoint,
            backend,
            previews,
            queue,
            events,
        }
    }

    /// Events received since the last call
    pub fn take_events(&mut self) -> Vec<CoreEvent> {
        self.events.drain()
    }
}

pub fn upload_events(events: &[CoreEvent]) -> Vec<UploadEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Upload(event) => Some(event.clone()),
            CoreEvent::Content(_) => None,
        })
        .collect()
}

pub fn added_content(events: &[CoreEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Content(ContentEvent::Added { content_id, .. }) => Some(content_id.clone()),
            _ => None,
        })
        .collect()
}
