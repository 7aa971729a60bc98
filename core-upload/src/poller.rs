//! # Job Status Poller
//!
//! Polls the job backend for every tracked job on a fixed interval until each
//! job reports a terminal status.
//!
//! ## Lifecycle
//!
//! The poll loop runs if and only if at least one job is tracked. Tracking the
//! first job starts it; the loop stops itself once the last job resolves, and
//! [`untrack`](JobStatusPoller::untrack) of the last job stops it at once.
//! Every start gets a fresh cancellation token, so a stopped loop can never
//! apply results after a restart.
//!
//! ## Rounds
//!
//! A round snapshots the tracked set and queries all jobs concurrently. The
//! next round is only scheduled once every request of the current one has
//! settled. A failed query is a transient miss for that job alone; only an
//! explicit `failed` status from the backend fails a job, unless one of the
//! optional caps in [`PollerConfig`] gives up on it first.
//!
//! Updates are delivered on the channel returned by [`JobStatusPoller::new`]:
//! progress snapshots while a job runs, then exactly one terminal status,
//! after which the job is no longer tracked.

use crate::error::UploadError;
use bridge_traits::{JobBackend, JobId, JobStatus};
use core_async::sync::{mpsc, CancellationToken};
use core_async::time::{interval_at, Duration, Instant, MissedTickBehavior};
use core_runtime::config::{PollingSettings, DEFAULT_POLL_INTERVAL_MS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Give up on a job after this many consecutive failed queries
    pub max_consecutive_misses: Option<u32>,
    /// Give up on a job still running this long after `track`
    pub processing_timeout: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_consecutive_misses: None,
            processing_timeout: None,
        }
    }
}

impl From<&PollingSettings> for PollerConfig {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            interval: settings.interval,
            max_consecutive_misses: settings.max_consecutive_misses,
            processing_timeout: settings.processing_timeout,
        }
    }
}

/// Status change for a tracked job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub job_id: JobId,
    pub status: JobStatus,
}

impl JobUpdate {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

struct TrackedJob {
    tracked_at: Instant,
    misses: u32,
    last_progress: Option<u8>,
}

struct PollTask {
    cancel: CancellationToken,
    generation: u64,
}

#[derive(Default)]
struct PollerState {
    jobs: HashMap<JobId, TrackedJob>,
    task: Option<PollTask>,
    next_generation: u64,
    rounds: u64,
}

struct PollerInner {
    backend: Arc<dyn JobBackend>,
    config: PollerConfig,
    state: Mutex<PollerState>,
    updates: mpsc::UnboundedSender<JobUpdate>,
}

#[derive(Clone)]
pub struct JobStatusPoller {
    inner: Arc<PollerInner>,
}

impl JobStatusPoller {
    /// Create an idle poller and the receiving end of its update channel.
    pub fn new(
        backend: Arc<dyn JobBackend>,
        config: PollerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<JobUpdate>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let poller = Self {
            inner: Arc::new(PollerInner {
                backend,
                config,
                state: Mutex::new(PollerState::default()),
                updates,
            }),
        };
        (poller, receiver)
    }

    /// Start polling `job_id`. Tracking an already tracked job is a no-op.
    ///
    /// Returns whether the job was newly tracked. Must be called from within
    /// a Tokio runtime.
    pub fn track(&self, job_id: JobId) -> bool {
        let mut state = self.inner.lock();
        if state.jobs.contains_key(&job_id) {
            return false;
        }
        state.jobs.insert(
            job_id.clone(),
            TrackedJob {
                tracked_at: Instant::now(),
                misses: 0,
                last_progress: None,
            },
        );
        debug!(job_id = %job_id, tracked = state.jobs.len(), "Tracking job");
        PollerInner::ensure_running(&self.inner, &mut state);
        true
    }

    /// Stop polling `job_id`. Untracking the last job stops the loop.
    pub fn untrack(&self, job_id: &JobId) -> bool {
        let mut state = self.inner.lock();
        let removed = state.jobs.remove(job_id).is_some();
        if removed {
            debug!(job_id = %job_id, "Untracked job");
            if state.jobs.is_empty() {
                PollerInner::stop_locked(&mut state);
            }
        }
        removed
    }

    /// Start the loop if jobs are tracked and it is not already running.
    pub fn start(&self) -> bool {
        let mut state = self.inner.lock();
        PollerInner::ensure_running(&self.inner, &mut state)
    }

    /// Stop the loop, keeping the tracked set. Results of a round in flight
    /// are discarded.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.lock();
        PollerInner::stop_locked(&mut state)
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().task.is_some()
    }

    pub fn is_tracked(&self, job_id: &JobId) -> bool {
        self.inner.lock().jobs.contains_key(job_id)
    }

    pub fn tracked_jobs(&self) -> Vec<JobId> {
        let mut jobs: Vec<JobId> = self.inner.lock().jobs.keys().cloned().collect();
        jobs.sort();
        jobs
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    /// Number of poll rounds whose results were applied
    pub fn rounds_completed(&self) -> u64 {
        self.inner.lock().rounds
    }
}

impl PollerInner {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_running(this: &Arc<Self>, state: &mut PollerState) -> bool {
        if state.task.is_some() || state.jobs.is_empty() {
            return false;
        }

        let cancel = CancellationToken::new();
        let generation = state.next_generation;
        state.next_generation += 1;
        state.task = Some(PollTask {
            cancel: cancel.clone(),
            generation,
        });

        info!(
            generation,
            interval_ms = this.config.interval.as_millis() as u64,
            "Starting job status polling"
        );
        core_async::spawn(run_poll_loop(
            Arc::downgrade(this),
            this.config.interval,
            cancel,
            generation,
        ));
        true
    }

    fn stop_locked(state: &mut PollerState) -> bool {
        match state.task.take() {
            Some(task) => {
                task.cancel.cancel();
                info!(generation = task.generation, "Stopped job status polling");
                true
            }
            None => false,
        }
    }

    /// Run one round. Returns `false` when the loop should exit.
    async fn poll_round(&self, cancel: &CancellationToken, generation: u64) -> bool {
        let snapshot: Vec<JobId> = self.lock().jobs.keys().cloned().collect();
        if snapshot.is_empty() {
            self.finish(generation);
            return false;
        }

        debug!(jobs = snapshot.len(), "Polling job statuses");
        let results = core_async::join_all(snapshot.into_iter().map(|job_id| async move {
            let result = self.backend.job_status(&job_id).await;
            (job_id, result)
        }))
        .await;

        if cancel.is_cancelled() {
            debug!(generation, "Discarding results of stopped poll round");
            return false;
        }

        let (updates, keep_running) = {
            let mut state = self.lock();
            state.rounds += 1;
            let mut updates = Vec::new();

            for (job_id, result) in results {
                let Some(job) = state.jobs.get_mut(&job_id) else {
                    continue;
                };

                let resolved = match result {
                    Ok(status) if status.is_terminal() => Some(status),
                    Ok(status) => {
                        job.misses = 0;
                        if let Some(progress) = status.progress() {
                            if job.last_progress.map_or(true, |last| progress > last) {
                                job.last_progress = Some(progress);
                                updates.push(JobUpdate {
                                    job_id: job_id.clone(),
                                    status,
                                });
                            }
                        }
                        self.check_timeout(&job_id, job)
                    }
                    Err(err) => {
                        job.misses += 1;
                        let transient = UploadError::PollTransient {
                            job_id: job_id.to_string(),
                            message: err.to_string(),
                        };
                        warn!(job_id = %job_id, misses = job.misses, error = %transient, "Status poll missed");
                        self.check_miss_cap(job).or_else(|| self.check_timeout(&job_id, job))
                    }
                };

                if let Some(status) = resolved {
                    state.jobs.remove(&job_id);
                    info!(job_id = %job_id, status = %status, "Job resolved");
                    updates.push(JobUpdate { job_id, status });
                }
            }

            let keep_running = !state.jobs.is_empty();
            if !keep_running {
                Self::clear_task(&mut state, generation);
            }
            (updates, keep_running)
        };

        for update in updates {
            if self.updates.send(update).is_err() {
                debug!("Job update receiver dropped");
            }
        }
        keep_running
    }

    fn check_miss_cap(&self, job: &TrackedJob) -> Option<JobStatus> {
        let cap = self.config.max_consecutive_misses?;
        (job.misses >= cap).then(|| JobStatus::Failed {
            message: format!("status unavailable after {} attempts", job.misses),
        })
    }

    fn check_timeout(&self, job_id: &JobId, job: &TrackedJob) -> Option<JobStatus> {
        let timeout = self.config.processing_timeout?;
        if job.tracked_at.elapsed() < timeout {
            return None;
        }
        warn!(job_id = %job_id, timeout_secs = timeout.as_secs(), "Job processing timed out");
        Some(JobStatus::Failed {
            message: format!("processing timed out after {}s", timeout.as_secs()),
        })
    }

    fn finish(&self, generation: u64) {
        let mut state = self.lock();
        if state.jobs.is_empty() {
            Self::clear_task(&mut state, generation);
        }
    }

    fn clear_task(state: &mut PollerState, generation: u64) {
        if matches!(&state.task, Some(task) if task.generation == generation) {
            state.task = None;
            info!(generation, "No tracked jobs left; polling stopped");
        }
    }
}

async fn run_poll_loop(
    inner: Weak<PollerInner>,
    period: Duration,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        core_async::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.poll_round(&cancel, generation).await {
            break;
        }
    }
    debug!(generation, "Poll loop exited");
}
