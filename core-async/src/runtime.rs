//! Runtime handles.
//!
//! Wraps tokio's runtime types so downstream crates never name tokio directly.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// Intended for synchronous host entry points and for forwarding log entries
/// when no runtime is active. Must not be called from within a runtime.
///
/// # Errors
///
/// Returns the IO error raised when the runtime cannot be built.
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
