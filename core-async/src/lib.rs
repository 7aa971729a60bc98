//! Runtime facade for the Clip Studio core crates.
//!
//! Every `core-*` and `provider-*` crate reaches the async runtime through this
//! crate instead of depending on tokio directly. That keeps the executor choice
//! in one place and gives the upload engine a single vocabulary for tasks,
//! timers, locks, channels and cancellation.
//!
//! # Modules
//!
//! - `task`: Task spawning and join handles
//! - `time`: Sleep, interval and timeout primitives
//! - `sync`: Async locks, channels and `CancellationToken`
//! - `runtime`: Runtime handles and a blocking entry point
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.clone();
//!
//!     let handle = core_async::spawn(async move {
//!         core_async::select! {
//!             _ = child.cancelled() => "cancelled",
//!             _ = sleep(Duration::from_secs(60)) => "elapsed",
//!         }
//!     });
//!
//!     token.cancel();
//!     assert_eq!(handle.await.unwrap(), "cancelled");
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use futures::future::join_all;
pub use tokio::select;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
