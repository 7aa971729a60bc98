//! # Upload Core
//!
//! Client-side upload queue and asynchronous job tracking for Clip Studio.
//!
//! ## Overview
//!
//! Files picked by the user are queued, uploaded to storage, submitted to the
//! processing backend as one batch, and polled until each job finishes. The
//! results are merged into the content list without duplicates, and every
//! preview handle leased for a queued file is released exactly once.
//!
//! ## Components
//!
//! - [`LeaseTracker`]: preview handle ownership per queue item
//! - [`UploadTransport`]: cancellable, progress-reporting file transfers
//! - [`JobSubmissionGateway`]: atomic batch submission with positional job ids
//! - [`JobStatusPoller`]: fixed-interval status polling, active only while jobs
//!   are tracked
//! - [`UploadQueue`]: the state machine tying the above together
//! - [`Reconciler`]: idempotent merge-by-identity for the content list
//!
//! ## Usage
//!
//! ```ignore
//! use core_upload::{QueueConfig, UploadQueue};
//! use core_runtime::events::EventBus;
//!
//! let queue = UploadQueue::new(endpoint, backend, previews, EventBus::new(100), QueueConfig::default());
//! let ids = queue.enqueue(files)?;
//! let outcome = queue.start_upload(&JobConfig::default()).await?;
//! println!("{} submitted, {} failed", outcome.submitted, outcome.failed);
//! ```

pub mod error;
pub mod gateway;
pub mod item;
pub mod lease;
pub mod poller;
pub mod queue;
pub mod reconciler;
pub mod transport;

pub use error::{Result, SubmissionError, TransportError, UploadError};
pub use gateway::{JobHandle, JobSubmissionGateway};
pub use item::{ItemState, QueueItem, QueueItemId};
pub use lease::{LeaseStats, LeaseTracker};
pub use poller::{JobStatusPoller, JobUpdate, PollerConfig};
pub use queue::{BatchOutcome, QueueConfig, QueueCounts, UploadQueue};
pub use reconciler::{ContentReconciler, Identified, Reconciler};
pub use transport::{ProgressCallback, TransferAbort, UploadHandle, UploadTransport};
