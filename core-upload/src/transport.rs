//! # Upload Transport
//!
//! Runs one cancellable, progress-reporting transfer per file on top of an
//! [`UploadEndpoint`].
//!
//! ## Guarantees
//!
//! - Progress percentages delivered to the callback are non-decreasing and
//!   within `0..=100`; the last call before a successful result is `100`.
//! - After [`TransferAbort::abort`] returns, the callback never fires again and
//!   the result resolves to [`TransportError::Aborted`].
//! - Aborting a settled transfer is a no-op.
//!
//! The progress callback runs while the transfer's own lock is held. Callers
//! must therefore never call `abort` while holding a lock that their
//! callback also takes.

use crate::error::TransportError;
use bridge_traits::{LocalFile, TransferProgress, UploadEndpoint, UploadedFileRef};
use core_async::sync::CancellationToken;
use core_async::task::JoinHandle;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument, warn};

/// Percentage progress callback
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Settled,
    Aborted,
}

struct ReporterState {
    phase: Phase,
    last_percent: Option<u8>,
}

struct TransferShared {
    state: Mutex<ReporterState>,
    cancel: CancellationToken,
    on_progress: ProgressCallback,
}

impl TransferShared {
    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, sent: u64, total: u64) {
        let mut state = self.lock();
        if state.phase != Phase::Running {
            return;
        }
        let percent = to_percent(sent, total);
        if matches!(state.last_percent, Some(last) if percent <= last) {
            return;
        }
        state.last_percent = Some(percent);
        (self.on_progress)(percent);
    }

    /// Resolve the transfer, unless it was aborted first.
    fn settle(
        &self,
        outcome: Result<UploadedFileRef, TransportError>,
    ) -> Result<UploadedFileRef, TransportError> {
        let mut state = self.lock();
        if state.phase == Phase::Aborted {
            return Err(TransportError::Aborted);
        }
        state.phase = Phase::Settled;

        if outcome.is_ok() && state.last_percent != Some(100) {
            state.last_percent = Some(100);
            (self.on_progress)(100);
        }
        outcome
    }

    fn abort(&self) -> bool {
        let mut state = self.lock();
        if state.phase != Phase::Running {
            return false;
        }
        state.phase = Phase::Aborted;
        self.cancel.cancel();
        true
    }
}

fn to_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total) as u128;
    (sent * 100 / total as u128) as u8
}

/// Cloneable abort capability for one transfer
#[derive(Clone)]
pub struct TransferAbort {
    shared: Arc<TransferShared>,
}

impl TransferAbort {
    /// Cancel the transfer. Returns `false` if it had already settled or
    /// been aborted.
    pub fn abort(&self) -> bool {
        self.shared.abort()
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.lock().phase == Phase::Aborted
    }
}

/// A running transfer: its eventual result plus an abort operation
pub struct UploadHandle {
    task: JoinHandle<Result<UploadedFileRef, TransportError>>,
    abort: TransferAbort,
}

impl UploadHandle {
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    pub fn abort_handle(&self) -> TransferAbort {
        self.abort.clone()
    }

    /// Wait for the transfer to settle
    pub async fn result(self) -> Result<UploadedFileRef, TransportError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Upload task ended abnormally");
                Err(TransportError::Network(format!(
                    "upload task ended unexpectedly: {}",
                    e
                )))
            }
        }
    }
}

#[derive(Clone)]
pub struct UploadTransport {
    endpoint: Arc<dyn UploadEndpoint>,
}

impl UploadTransport {
    pub fn new(endpoint: Arc<dyn UploadEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Begin transferring `file` to `destination`.
    ///
    /// Must be called from within a Tokio runtime; the transfer runs on its
    /// own task so several can proceed concurrently.
    #[instrument(skip(self, file, destination, on_progress), fields(file = %file.name, bytes = file.size_bytes()))]
    pub fn start(
        &self,
        file: LocalFile,
        destination: impl Into<String>,
        on_progress: ProgressCallback,
    ) -> UploadHandle {
        let destination = destination.into();
        let shared = Arc::new(TransferShared {
            state: Mutex::new(ReporterState {
                phase: Phase::Running,
                last_percent: None,
            }),
            cancel: CancellationToken::new(),
            on_progress,
        });

        let reporter = Arc::clone(&shared);
        let progress: TransferProgress = Arc::new(move |sent, total| reporter.report(sent, total));
        let endpoint = Arc::clone(&self.endpoint);
        let task_shared = Arc::clone(&shared);

        let task = core_async::spawn(async move {
            let outcome = core_async::select! {
                biased;
                _ = task_shared.cancel.cancelled() => Err(TransportError::Aborted),
                result = endpoint.upload(&file, &destination, progress) => {
                    result.map_err(TransportError::from)
                }
            };

            let outcome = task_shared.settle(outcome);
            match &outcome {
                Ok(reference) => debug!(file = %file.name, file_id = %reference.file_id, "Upload finished"),
                Err(TransportError::Aborted) => debug!(file = %file.name, "Upload aborted"),
                Err(e) => warn!(file = %file.name, error = %e, "Upload failed"),
            }
            outcome
        });

        UploadHandle {
            task,
            abort: TransferAbort { shared },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use std::sync::atomic::{AtomicBool, Ordering};

    enum Script {
        Succeed(Vec<(u64, u64)>),
        Fail(fn() -> BridgeError),
        HangAfter(Vec<(u64, u64)>),
    }

    struct ScriptedEndpoint {
        script: Script,
        dropped: Arc<AtomicBool>,
        progress: Mutex<Option<TransferProgress>>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl ScriptedEndpoint {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                dropped: Arc::new(AtomicBool::new(false)),
                progress: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl UploadEndpoint for ScriptedEndpoint {
        async fn upload(
            &self,
            file: &LocalFile,
            destination: &str,
            progress: TransferProgress,
        ) -> bridge_traits::error::Result<UploadedFileRef> {
            let _flag = DropFlag(self.dropped.clone());
            *self.progress.lock().unwrap() = Some(progress.clone());
            match &self.script {
                Script::Succeed(steps) => {
                    for (sent, total) in steps {
                        progress(*sent, *total);
                    }
                    Ok(UploadedFileRef {
                        file_id: format!("f-{}", file.name),
                        path: format!("{}/{}", destination, file.name),
                        url: None,
                    })
                }
                Script::Fail(make) => Err(make()),
                Script::HangAfter(steps) => {
                    for (sent, total) in steps {
                        progress(*sent, *total);
                    }
                    futures::future::pending().await
                }
            }
        }
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    fn file() -> LocalFile {
        LocalFile::new("clip.mp4", "video/mp4", vec![1u8; 1000].into())
    }

    #[tokio::test]
    async fn test_success_ends_with_100() {
        let endpoint = ScriptedEndpoint::new(Script::Succeed(vec![(250, 1000), (700, 1000)]));
        let (callback, seen) = recorder();

        let handle = UploadTransport::new(endpoint).start(file(), "uploads", callback);
        let reference = handle.result().await.unwrap();

        assert_eq!(reference.path, "uploads/clip.mp4");
        assert_eq!(*seen.lock().unwrap(), vec![25, 70, 100]);
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let endpoint = ScriptedEndpoint::new(Script::Succeed(vec![
            (600, 1000),
            (300, 1000),
            (600, 1000),
            (5000, 1000),
        ]));
        let (callback, seen) = recorder();

        UploadTransport::new(endpoint)
            .start(file(), "uploads", callback)
            .result()
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![60, 100]);
    }

    #[tokio::test]
    async fn test_failure_reasons() {
        let network = ScriptedEndpoint::new(Script::Fail(|| BridgeError::Network("reset".into())));
        let (callback, _) = recorder();
        let err = UploadTransport::new(network)
            .start(file(), "uploads", callback)
            .result()
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Network("reset".into()));

        let server = ScriptedEndpoint::new(Script::Fail(|| BridgeError::HttpStatus {
            status: 500,
            message: "oops".into(),
        }));
        let (callback, seen) = recorder();
        let err = UploadTransport::new(server)
            .start(file(), "uploads", callback)
            .result()
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Server(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort_stops_callbacks_and_resolves_aborted() {
        let endpoint = ScriptedEndpoint::new(Script::HangAfter(vec![(400, 1000)]));
        let (callback, seen) = recorder();

        let handle = UploadTransport::new(endpoint.clone()).start(file(), "uploads", callback);
        while seen.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(handle.abort());
        assert!(!handle.abort());

        // A late callback from the endpoint is swallowed.
        let late = endpoint.progress.lock().unwrap().clone().unwrap();
        late(900, 1000);

        assert_eq!(handle.result().await.unwrap_err(), TransportError::Aborted);
        assert_eq!(*seen.lock().unwrap(), vec![40]);
        assert!(endpoint.dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_after_settle_is_noop() {
        let endpoint = ScriptedEndpoint::new(Script::Succeed(vec![]));
        let (callback, seen) = recorder();

        let handle = UploadTransport::new(endpoint).start(file(), "uploads", callback);
        let abort = handle.abort_handle();
        let result = handle.result().await;

        assert!(result.is_ok());
        assert!(!abort.abort());
        assert!(!abort.is_aborted());
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[test]
    fn test_to_percent() {
        assert_eq!(to_percent(0, 0), 100);
        assert_eq!(to_percent(1, 3), 33);
        assert_eq!(to_percent(10, 5), 100);
        assert_eq!(to_percent(u64::MAX, u64::MAX), 100);
    }
}
