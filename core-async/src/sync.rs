//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`, plus the
//! `CancellationToken` used to abort uploads and stop the poll loop.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, Mutex};
//!
//! async fn example() {
//!     let mutex = Mutex::new(0);
//!     *mutex.lock().await += 1;
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     tx.send("job-1").unwrap();
//!     assert_eq!(rx.recv().await, Some("job-1"));
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::{CancellationToken, DropGuard};
