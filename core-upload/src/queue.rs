//! # Upload Queue
//!
//! Owns every [`QueueItem`] and drives it through upload, job submission and
//! status polling, then hands finished results to the content list.
//!
//! ## Flow
//!
//! 1. [`enqueue`](UploadQueue::enqueue) leases a preview handle per file and
//!    creates `Queued` items. No network activity.
//! 2. [`start_upload`](UploadQueue::start_upload) starts one transfer per
//!    `Queued` item, submits every successful upload as one batch, and tracks
//!    the returned jobs with the [`JobStatusPoller`].
//! 3. A dispatcher task applies poller updates: completed jobs are fetched,
//!    merged into the content list and leave the queue; failed jobs stay as
//!    `Failed` items until dismissed.
//!
//! ## Locking
//!
//! Transfer progress callbacks run under the transfer's own lock and then take
//! the queue lock, so the queue lock is always released before a transfer is
//! aborted. The queue may call into the lease tracker and the poller while
//! locked; neither ever calls back into the queue.

use crate::error::{Result, SubmissionError, TransportError, UploadError};
use crate::gateway::JobSubmissionGateway;
use crate::item::{ItemState, QueueItem, QueueItemId};
use crate::lease::{LeaseStats, LeaseTracker};
use crate::poller::{JobStatusPoller, JobUpdate, PollerConfig};
use crate::reconciler::ContentReconciler;
use crate::transport::{ProgressCallback, TransferAbort, UploadTransport};
use bridge_traits::{
    BridgeError, ContentItem, JobBackend, JobConfig, JobId, JobStatus, LocalFile,
    PreviewFactory, RetryPolicy, UploadEndpoint, UploadedFileRef,
};
use core_async::sync::{mpsc, CancellationToken};
use core_async::time::{sleep, Duration};
use core_runtime::config::{ContentOrdering, CoreConfig};
use core_runtime::events::{ContentEvent, CoreEvent, EventBus, ProgressStage, UploadEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_UPLOAD_DESTINATION: &str = "uploads";
const DEFAULT_RESULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_RESULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Storage path prefix passed to the upload endpoint
    pub upload_destination: String,
    pub poller: PollerConfig,
    /// Attempts made to fetch a completed job's content item
    pub result_fetch_attempts: u32,
    /// First backoff delay between result fetch attempts
    pub result_retry_base_delay: Duration,
    pub content_ordering: ContentOrdering,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            upload_destination: DEFAULT_UPLOAD_DESTINATION.to_string(),
            poller: PollerConfig::default(),
            result_fetch_attempts: DEFAULT_RESULT_FETCH_ATTEMPTS,
            result_retry_base_delay: DEFAULT_RESULT_RETRY_BASE_DELAY,
            content_ordering: ContentOrdering::default(),
        }
    }
}

impl QueueConfig {
    pub fn from_core(config: &CoreConfig) -> Self {
        Self {
            upload_destination: config.upload_destination.clone(),
            poller: PollerConfig::from(&config.polling),
            result_fetch_attempts: config.result_fetch_attempts,
            content_ordering: config.content_ordering,
            ..Self::default()
        }
    }

    fn result_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.result_fetch_attempts.max(1),
            base_delay: self.result_retry_base_delay,
            ..RetryPolicy::default()
        }
    }
}

/// What happened to the items picked up by one `start_upload` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Transfers started
    pub started: usize,
    /// Items that reached `Processing`
    pub submitted: usize,
    /// Items that reached `Failed` during upload or submission
    pub failed: usize,
    /// Items removed or aborted before submission
    pub aborted: usize,
}

/// Item counts by state.
///
/// `completed` counts items that completed during this session; completed
/// items leave the queue immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub queued: usize,
    pub uploading: usize,
    pub processing: usize,
    pub failed: usize,
    pub completed: u64,
}

impl QueueCounts {
    /// Items still in the queue
    pub fn total(&self) -> usize {
        self.queued + self.uploading + self.processing + self.failed
    }
}

#[derive(Default)]
struct QueueState {
    items: Vec<QueueItem>,
    files: HashMap<QueueItemId, LocalFile>,
    transfers: HashMap<QueueItemId, TransferAbort>,
    jobs: HashMap<JobId, QueueItemId>,
    completed_count: u64,
    shut_down: bool,
}

impl QueueState {
    fn position(&self, id: QueueItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn item(&self, id: QueueItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    fn item_mut(&mut self, id: QueueItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Remove an item and everything the queue keeps for it.
    fn detach(&mut self, id: QueueItemId) -> Option<QueueItem> {
        let position = self.position(id)?;
        self.files.remove(&id);
        self.transfers.remove(&id);
        let mut item = self.items.remove(position);
        if let Some(job_id) = item.remote_job_id() {
            self.jobs.remove(job_id);
        }
        item.clear_resource_handle();
        Some(item)
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    leases: LeaseTracker,
    transport: UploadTransport,
    gateway: JobSubmissionGateway,
    poller: JobStatusPoller,
    backend: Arc<dyn JobBackend>,
    content: Mutex<ContentReconciler>,
    event_bus: EventBus,
    config: QueueConfig,
    shutdown: CancellationToken,
    updates: Mutex<Option<mpsc::UnboundedReceiver<JobUpdate>>>,
}

/// Cloneable handle to the upload queue.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

impl UploadQueue {
    pub fn new(
        endpoint: Arc<dyn UploadEndpoint>,
        backend: Arc<dyn JobBackend>,
        previews: Arc<dyn PreviewFactory>,
        event_bus: EventBus,
        config: QueueConfig,
    ) -> Self {
        let (poller, updates) = JobStatusPoller::new(Arc::clone(&backend), config.poller);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                leases: LeaseTracker::new(previews),
                transport: UploadTransport::new(endpoint),
                gateway: JobSubmissionGateway::new(Arc::clone(&backend)),
                poller,
                backend,
                content: Mutex::new(ContentReconciler::new(config.content_ordering)),
                event_bus,
                config,
                shutdown: CancellationToken::new(),
                updates: Mutex::new(Some(updates)),
            }),
        }
    }

    /// Add `files` as `Queued` items, leasing one preview handle each.
    ///
    /// All or nothing: if any handle cannot be created, the handles already
    /// leased for this call are released and no item is added.
    pub fn enqueue(&self, files: Vec<LocalFile>) -> Result<Vec<QueueItemId>> {
        if self.is_shut_down() {
            return Err(UploadError::ShutDown);
        }

        let mut leased = Vec::with_capacity(files.len());
        for file in files {
            let id = QueueItemId::new();
            match self.inner.leases.acquire(id, &file) {
                Ok(handle) => leased.push((id, file, handle)),
                Err(e) => {
                    warn!(file = %file.name, error = %e, "Could not lease preview handle");
                    for (id, _, _) in &leased {
                        self.inner.leases.release(*id);
                    }
                    return Err(e);
                }
            }
        }

        let mut events = Vec::with_capacity(leased.len());
        let ids = {
            let mut state = self.inner.lock();
            let mut ids = Vec::with_capacity(leased.len());
            for (id, file, handle) in leased {
                state.items.push(QueueItem::new(id, &file, Some(handle)));
                events.push(UploadEvent::Enqueued {
                    item_id: id.to_string(),
                    filename: file.name.clone(),
                    size_bytes: file.size_bytes(),
                });
                state.files.insert(id, file);
                ids.push(id);
            }
            ids
        };

        info!(count = ids.len(), "Enqueued files");
        for event in events {
            self.inner.emit_upload(event);
        }
        Ok(ids)
    }

    /// Upload every `Queued` item and submit the successful uploads as one
    /// processing batch.
    ///
    /// Resolves once every transfer has settled and the batch submission has
    /// finished. Per-item failures are recorded on the items and reported in
    /// the returned [`BatchOutcome`]; only an invalid `config` or a shut-down
    /// queue fail the call itself, before any item changes.
    #[instrument(skip(self, config))]
    pub async fn start_upload(&self, config: &JobConfig) -> Result<BatchOutcome> {
        config
            .validate()
            .map_err(|e| SubmissionError::InvalidConfig(e.to_string()))?;
        self.inner.ensure_dispatcher();

        let started = {
            let mut state = self.inner.lock();
            if state.shut_down {
                return Err(UploadError::ShutDown);
            }

            let ready: Vec<QueueItemId> = state
                .items
                .iter()
                .filter(|item| item.state() == ItemState::Queued)
                .map(QueueItem::id)
                .filter(|id| self.inner.leases.is_held(*id))
                .collect();

            let mut started = Vec::with_capacity(ready.len());
            for id in ready {
                if let Some(Err(e)) = state.item_mut(id).map(QueueItem::begin_upload) {
                    error!(item_id = %id, error = %e, "Could not start upload");
                    continue;
                }
                let Some(file) = state.files.remove(&id) else {
                    error!(item_id = %id, "Queued item has no file data");
                    if let Some(item) = state.item_mut(id) {
                        item.fail("file data unavailable").ok();
                    }
                    continue;
                };
                let handle = self.inner.transport.start(
                    file,
                    self.inner.config.upload_destination.clone(),
                    QueueInner::progress_callback(&self.inner, id),
                );
                state.transfers.insert(id, handle.abort_handle());
                started.push((id, handle));
            }
            started
        };

        let mut outcome = BatchOutcome {
            started: started.len(),
            ..BatchOutcome::default()
        };
        if started.is_empty() {
            debug!("No queued items to upload");
            return Ok(outcome);
        }
        info!(count = started.len(), "Started uploads");

        let results = core_async::join_all(
            started
                .into_iter()
                .map(|(id, handle)| async move { (id, handle.result().await) }),
        )
        .await;

        let uploaded = self.inner.settle_transfers(results, &mut outcome);
        if uploaded.is_empty() {
            return Ok(outcome);
        }
        if self.is_shut_down() {
            debug!(items = uploaded.len(), "Queue shut down before submission");
            outcome.aborted += uploaded.len();
            return Ok(outcome);
        }

        let refs: Vec<UploadedFileRef> = uploaded.iter().map(|(_, r)| r.clone()).collect();
        match self.inner.gateway.submit_batch(&refs, config).await {
            Ok(handles) => {
                let job_ids = handles.into_iter().map(|handle| handle.job_id);
                self.inner
                    .register_jobs(uploaded.iter().map(|(id, _)| *id).zip(job_ids), &mut outcome);
            }
            Err(e) => {
                let err = UploadError::from(e);
                warn!(error = %err, items = uploaded.len(), "Batch submission failed");
                let message = format!("Submission failed: {}", err);
                self.inner
                    .fail_uploaded(uploaded.iter().map(|(id, _)| *id), &message, &mut outcome);
            }
        }

        info!(
            started = outcome.started,
            submitted = outcome.submitted,
            failed = outcome.failed,
            aborted = outcome.aborted,
            "Upload batch settled"
        );
        Ok(outcome)
    }

    /// Remove a `Queued`, `Uploading` or `Failed` item and release its lease.
    ///
    /// An `Uploading` item's transfer is aborted first; nothing from that
    /// transfer reaches the item afterwards.
    pub fn remove_queued(&self, id: QueueItemId) -> Result<()> {
        let abort = {
            let mut state = self.inner.lock();
            let item = state
                .item(id)
                .ok_or_else(|| UploadError::ItemNotFound(id.to_string()))?;

            match item.state() {
                ItemState::Queued | ItemState::Failed => {
                    state.detach(id);
                    None
                }
                ItemState::Uploading => {
                    let abort = state.transfers.remove(&id);
                    if abort.is_none() {
                        state.detach(id);
                    }
                    abort
                }
                other @ (ItemState::Processing | ItemState::Completed) => {
                    return Err(UploadError::InvalidStateTransition {
                        from: other.as_str().to_string(),
                        to: "removed".to_string(),
                        reason: "only queued, uploading or failed items can be removed"
                            .to_string(),
                    });
                }
            }
        };

        if let Some(abort) = abort {
            let aborted = abort.abort();
            debug!(item_id = %id, aborted, "Aborted transfer for removed item");
            let detached = self.inner.lock().detach(id);
            if let Some(job_id) = detached.as_ref().and_then(|item| item.remote_job_id()) {
                self.inner.poller.untrack(job_id);
            }
        }

        self.inner.leases.release(id);
        info!(item_id = %id, "Removed item from queue");
        self.inner.emit_upload(UploadEvent::Removed {
            item_id: id.to_string(),
        });
        Ok(())
    }

    /// Remove every `Queued` item. Returns how many were removed.
    pub fn clear_queue(&self) -> usize {
        let removed: Vec<QueueItemId> = {
            let mut state = self.inner.lock();
            let queued: Vec<QueueItemId> = state
                .items
                .iter()
                .filter(|item| item.state() == ItemState::Queued)
                .map(QueueItem::id)
                .collect();
            for id in &queued {
                state.detach(*id);
            }
            queued
        };

        for id in &removed {
            self.inner.leases.release(*id);
            self.inner.emit_upload(UploadEvent::Removed {
                item_id: id.to_string(),
            });
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Cleared queued items");
        }
        removed.len()
    }

    /// Abort live transfers, stop polling and release every lease.
    ///
    /// Idempotent. The queue rejects `enqueue` and `start_upload` afterwards.
    pub fn shutdown(&self) {
        let transfers: Vec<TransferAbort> = {
            let mut state = self.inner.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            for item in &mut state.items {
                item.clear_resource_handle();
            }
            state.transfers.drain().map(|(_, abort)| abort).collect()
        };

        for abort in &transfers {
            abort.abort();
        }
        self.inner.poller.stop();
        self.inner.shutdown.cancel();
        let released = self.inner.leases.release_all();
        info!(
            aborted = transfers.len(),
            released, "Upload queue shut down"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.inner.lock();
        let mut counts = QueueCounts {
            completed: state.completed_count,
            ..QueueCounts::default()
        };
        for item in &state.items {
            match item.state() {
                ItemState::Queued => counts.queued += 1,
                ItemState::Uploading => counts.uploading += 1,
                ItemState::Processing => counts.processing += 1,
                ItemState::Failed => counts.failed += 1,
                ItemState::Completed => {}
            }
        }
        counts
    }

    pub fn queued_count(&self) -> usize {
        self.counts().queued
    }

    pub fn uploading_count(&self) -> usize {
        self.counts().uploading
    }

    pub fn processing_count(&self) -> usize {
        self.counts().processing
    }

    pub fn failed_count(&self) -> usize {
        self.counts().failed
    }

    /// Items that reached `Completed` during this session
    pub fn completed_count(&self) -> u64 {
        self.inner.lock().completed_count
    }

    /// Snapshot of the queue in enqueue order
    pub fn items(&self) -> Vec<QueueItem> {
        self.inner.lock().items.clone()
    }

    pub fn item(&self, id: QueueItemId) -> Option<QueueItem> {
        self.inner.lock().item(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Snapshot of the content list in display order
    pub fn content(&self) -> Vec<ContentItem> {
        self.inner.lock_content().items().to_vec()
    }

    /// Merge an independently fetched content list. Returns the number of
    /// items that were not already present.
    pub fn merge_content(&self, items: impl IntoIterator<Item = ContentItem>) -> usize {
        let added = self.inner.lock_content().merge_all(items);
        debug!(added, "Merged content refresh");
        added
    }

    pub fn is_polling(&self) -> bool {
        self.inner.poller.is_running()
    }

    pub fn tracked_jobs(&self) -> Vec<JobId> {
        self.inner.poller.tracked_jobs()
    }

    pub fn live_leases(&self) -> usize {
        self.inner.leases.live_count()
    }

    pub fn lease_stats(&self) -> LeaseStats {
        self.inner.leases.stats()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_content(&self) -> MutexGuard<'_, ContentReconciler> {
        self.content
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit_upload(&self, event: UploadEvent) {
        self.event_bus.emit(CoreEvent::Upload(event)).ok();
    }

    fn progress_callback(this: &Arc<Self>, id: QueueItemId) -> ProgressCallback {
        let queue = Arc::downgrade(this);
        Arc::new(move |percent| {
            if let Some(queue) = queue.upgrade() {
                queue.apply_upload_progress(id, percent);
            }
        })
    }

    fn apply_upload_progress(&self, id: QueueItemId, percent: u8) {
        let changed = {
            let mut state = self.lock();
            match state.item_mut(id) {
                Some(item) if item.state() == ItemState::Uploading => {
                    item.record_upload_progress(percent).unwrap_or(false)
                }
                _ => false,
            }
        };
        if changed {
            debug!(item_id = %id, percent, "Upload progress");
            self.emit_upload(UploadEvent::Progress {
                item_id: id.to_string(),
                stage: ProgressStage::Uploading,
                percent,
            });
        }
    }

    /// Record transfer results. Returns the uploads still eligible for
    /// submission, in start order.
    fn settle_transfers(
        &self,
        results: Vec<(QueueItemId, std::result::Result<UploadedFileRef, TransportError>)>,
        outcome: &mut BatchOutcome,
    ) -> Vec<(QueueItemId, UploadedFileRef)> {
        let mut uploaded = Vec::new();
        let mut events = Vec::new();
        {
            let mut state = self.lock();
            for (id, result) in results {
                state.transfers.remove(&id);
                let Some(item) = state
                    .item_mut(id)
                    .filter(|item| item.state() == ItemState::Uploading)
                else {
                    debug!(item_id = %id, "Item left the queue during upload");
                    outcome.aborted += 1;
                    continue;
                };

                match result {
                    Ok(file_ref) => uploaded.push((id, file_ref)),
                    Err(TransportError::Aborted) => outcome.aborted += 1,
                    Err(e) => {
                        let message = e.to_string();
                        if item.fail(message.clone()).is_ok() {
                            warn!(item_id = %id, error = %message, "Upload failed");
                            outcome.failed += 1;
                            events.push(UploadEvent::Failed {
                                item_id: id.to_string(),
                                message,
                                recoverable: e.is_network(),
                            });
                        }
                    }
                }
            }
        }

        for event in events {
            self.emit_upload(event);
        }
        uploaded
    }

    fn register_jobs(
        &self,
        assignments: impl Iterator<Item = (QueueItemId, JobId)>,
        outcome: &mut BatchOutcome,
    ) {
        let mut events = Vec::new();
        {
            let mut state = self.lock();
            let shut_down = state.shut_down;
            for (id, job_id) in assignments {
                let Some(item) = state.item_mut(id) else {
                    debug!(item_id = %id, job_id = %job_id, "Item removed before its job was registered");
                    outcome.aborted += 1;
                    continue;
                };
                if let Err(e) = item.mark_processing(job_id.clone()) {
                    error!(item_id = %id, error = %e, "Could not register job");
                    continue;
                }

                state.jobs.insert(job_id.clone(), id);
                outcome.submitted += 1;
                info!(item_id = %id, job_id = %job_id, "Item processing");
                events.push(UploadEvent::Processing {
                    item_id: id.to_string(),
                    job_id: job_id.to_string(),
                });
                // Tracked under the queue lock so a concurrent shutdown
                // always stops the poller after this.
                if !shut_down {
                    self.poller.track(job_id);
                }
            }
        }

        for event in events {
            self.emit_upload(event);
        }
    }

    fn fail_uploaded(
        &self,
        ids: impl Iterator<Item = QueueItemId>,
        message: &str,
        outcome: &mut BatchOutcome,
    ) {
        let mut events = Vec::new();
        {
            let mut state = self.lock();
            for id in ids {
                let failed = state
                    .item_mut(id)
                    .map_or(false, |item| item.fail(message).is_ok());
                if failed {
                    outcome.failed += 1;
                    events.push(UploadEvent::Failed {
                        item_id: id.to_string(),
                        message: message.to_string(),
                        recoverable: false,
                    });
                } else {
                    outcome.aborted += 1;
                }
            }
        }

        for event in events {
            self.emit_upload(event);
        }
    }

    /// Start the task that applies poller updates, once.
    fn ensure_dispatcher(self: &Arc<Self>) {
        let receiver = self
            .updates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(mut updates) = receiver else {
            return;
        };

        let queue = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        core_async::spawn(async move {
            loop {
                let update = core_async::select! {
                    _ = shutdown.cancelled() => break,
                    update = updates.recv() => match update {
                        Some(update) => update,
                        None => break,
                    },
                };
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                queue.handle_job_update(update).await;
            }
            debug!("Job update dispatcher stopped");
        });
    }

    async fn handle_job_update(&self, update: JobUpdate) {
        let item_id = self.lock().jobs.get(&update.job_id).copied();
        let Some(item_id) = item_id else {
            debug!(job_id = %update.job_id, "Update for unknown job");
            return;
        };

        match update.status {
            JobStatus::Completed { result_id } => {
                self.complete_job(item_id, &update.job_id, &result_id).await
            }
            JobStatus::Failed { message } => self.fail_job(item_id, &update.job_id, message),
            status => {
                if let Some(percent) = status.progress() {
                    self.apply_processing_progress(item_id, percent);
                }
            }
        }
    }

    fn apply_processing_progress(&self, id: QueueItemId, percent: u8) {
        let changed = self
            .lock()
            .item_mut(id)
            .map_or(false, |item| item.record_processing_progress(percent).unwrap_or(false));
        if changed {
            debug!(item_id = %id, percent, "Processing progress");
            self.emit_upload(UploadEvent::Progress {
                item_id: id.to_string(),
                stage: ProgressStage::Processing,
                percent,
            });
        }
    }

    async fn complete_job(&self, id: QueueItemId, job_id: &JobId, result_id: &str) {
        let content = match self.fetch_result(result_id).await {
            Ok(content) => content,
            Err(e) => {
                self.fail_job(id, job_id, format!("result unavailable: {}", e));
                return;
            }
        };
        let content_id = content.id.clone();
        let title = content.title.clone();

        if self.lock_content().merge(content) {
            info!(content_id = %content_id, "Content added");
            self.event_bus
                .emit(CoreEvent::Content(ContentEvent::Added {
                    content_id: content_id.clone(),
                    title,
                }))
                .ok();
        } else {
            debug!(content_id = %content_id, "Content already listed");
        }

        let completed = {
            let mut state = self.lock();
            let done = match state.item_mut(id) {
                Some(item) => match item.complete() {
                    Ok(()) => true,
                    Err(e) => {
                        error!(item_id = %id, error = %e, "Could not complete item");
                        false
                    }
                },
                None => false,
            };
            if done {
                state.detach(id);
                state.completed_count += 1;
            }
            done
        };
        if !completed {
            return;
        }

        self.leases.release(id);
        info!(item_id = %id, job_id = %job_id, content_id = %content_id, "Item completed");
        self.emit_upload(UploadEvent::Completed {
            item_id: id.to_string(),
            job_id: job_id.to_string(),
            content_id,
        });
    }

    fn fail_job(&self, id: QueueItemId, job_id: &JobId, message: String) {
        let failed = {
            let mut state = self.lock();
            state.jobs.remove(job_id);
            state
                .item_mut(id)
                .map_or(false, |item| item.fail(message.clone()).is_ok())
        };
        if !failed {
            return;
        }

        let err = UploadError::JobFailed {
            job_id: job_id.to_string(),
            message: message.clone(),
        };
        warn!(item_id = %id, error = %err, "Job failed");
        self.emit_upload(UploadEvent::Failed {
            item_id: id.to_string(),
            message,
            recoverable: false,
        });
    }

    async fn fetch_result(&self, result_id: &str) -> std::result::Result<ContentItem, BridgeError> {
        let policy = self.config.result_retry_policy();
        let mut attempt = 1;
        loop {
            match self.backend.fetch_result(result_id).await {
                Ok(content) => return Ok(content),
                Err(e) if attempt < policy.max_attempts => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        result_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Result fetch failed, retrying"
                    );
                    core_async::select! {
                        _ = self.shutdown.cancelled() => return Err(BridgeError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
