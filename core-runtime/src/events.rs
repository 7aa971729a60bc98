//! # Event Bus System
//!
//! Provides an event-driven architecture for the upload engine using `tokio::sync::broadcast`.
//! Hosts subscribe to follow queue progress and to present failures; the core
//! never renders notifications itself.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for upload and content changes
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Upload Queue ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                                │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │  Reconciler  ├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Upload(UploadEvent::Removed {
//!         item_id: "item-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Item removed from queue");
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Upload Events
//! - `Enqueued`: File accepted into the queue
//! - `Progress`: Upload or processing percentage changed
//! - `Processing`: Backend job accepted for an uploaded file
//! - `Completed`: Job finished and its content item was reconciled
//! - `Failed`: Item reached the failed state
//! - `Removed`: Item left the queue without completing (including aborts)
//!
//! ### Content Events
//! - `Added`: A new item entered the content list
//!
//! Aborting an upload is deliberate and only ever produces `Removed`.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Queue item lifecycle events
    Upload(UploadEvent),
    /// Content list events
    Content(ContentEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Content(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Upload(UploadEvent::Failed {
                recoverable: true, ..
            }) => EventSeverity::Warning,
            CoreEvent::Upload(UploadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Content(ContentEvent::Added { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Upload Events
// ============================================================================

/// Which half of the pipeline a progress value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Uploading,
    Processing,
}

/// Events describing a queue item's journey from selection to content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// File accepted into the queue.
    Enqueued {
        item_id: String,
        filename: String,
        size_bytes: u64,
    },
    /// Progress changed for an item.
    Progress {
        item_id: String,
        stage: ProgressStage,
        /// Percentage (0-100).
        percent: u8,
    },
    /// Upload finished and the backend accepted a processing job.
    Processing { item_id: String, job_id: String },
    /// Job finished; the item left the queue and its content was reconciled.
    Completed {
        item_id: String,
        job_id: String,
        content_id: String,
    },
    /// Item reached the failed state and stays queued until dismissed.
    Failed {
        item_id: String,
        /// Human-readable error message.
        message: String,
        /// Whether re-selecting the file is likely to succeed (network trouble).
        recoverable: bool,
    },
    /// Item left the queue by removal, clearing or abort.
    Removed { item_id: String },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Enqueued { .. } => "File queued for upload",
            UploadEvent::Progress { .. } => "Upload in progress",
            UploadEvent::Processing { .. } => "Processing job submitted",
            UploadEvent::Completed { .. } => "Processing completed",
            UploadEvent::Failed { .. } => "Upload failed",
            UploadEvent::Removed { .. } => "Item removed from queue",
        }
    }

    /// Queue item the event refers to.
    pub fn item_id(&self) -> &str {
        match self {
            UploadEvent::Enqueued { item_id, .. }
            | UploadEvent::Progress { item_id, .. }
            | UploadEvent::Processing { item_id, .. }
            | UploadEvent::Completed { item_id, .. }
            | UploadEvent::Failed { item_id, .. }
            | UploadEvent::Removed { item_id } => item_id,
        }
    }
}

// ============================================================================
// Content Events
// ============================================================================

/// Events related to the authoritative content list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ContentEvent {
    /// New item merged into the content list.
    Added { content_id: String, title: String },
}

impl ContentEvent {
    fn description(&self) -> &str {
        match self {
            ContentEvent::Added { .. } => "Content added",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting events to multiple subscribers.
///
/// - Multiple publishers can emit events concurrently
/// - Multiple subscribers receive all events independently
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening. Publishers treat the latter as benign:
    ///
    /// ```rust
    /// use core_runtime::events::{ContentEvent, CoreEvent, EventBus};
    ///
    /// let event_bus = EventBus::new(16);
    /// event_bus
    ///     .emit(CoreEvent::Content(ContentEvent::Added {
    ///         content_id: "c-1".to_string(),
    ///         title: "Launch teaser".to_string(),
    ///     }))
    ///     .ok();
    /// ```
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Creates a filtering stream over a fresh subscription.
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let uploads_only = event_bus
///     .stream()
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every event currently buffered, skipping filtered ones and lag markers.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
