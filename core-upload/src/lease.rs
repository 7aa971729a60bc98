//! # Resource Lease Tracker
//!
//! Owns the preview handles created for queued files, keyed by queue item.
//! Every handle is revoked exactly once: on `release`, on `release_all`, or
//! when the tracker is dropped.

use crate::error::{Result, UploadError};
use crate::item::QueueItemId;
use bridge_traits::{LocalFile, PreviewFactory, PreviewUrl};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Lifetime acquisition and release totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseStats {
    pub acquired: u64,
    pub released: u64,
}

impl LeaseStats {
    pub fn live(&self) -> u64 {
        self.acquired - self.released
    }
}

#[derive(Default)]
struct LeaseState {
    handles: HashMap<QueueItemId, PreviewUrl>,
    stats: LeaseStats,
    closed: bool,
}

pub struct LeaseTracker {
    factory: Arc<dyn PreviewFactory>,
    state: Mutex<LeaseState>,
}

impl LeaseTracker {
    pub fn new(factory: Arc<dyn PreviewFactory>) -> Self {
        Self {
            factory,
            state: Mutex::new(LeaseState::default()),
        }
    }

    /// Create the preview handle for `item_id`.
    ///
    /// # Errors
    ///
    /// - [`UploadError::LeaseAlreadyHeld`] if the item still holds a handle
    /// - [`UploadError::ShutDown`] after `release_all`
    /// - [`UploadError::Bridge`] if the host cannot create the handle
    pub fn acquire(&self, item_id: QueueItemId, file: &LocalFile) -> Result<PreviewUrl> {
        let mut state = self.lock();
        if state.closed {
            return Err(UploadError::ShutDown);
        }
        if state.handles.contains_key(&item_id) {
            return Err(UploadError::LeaseAlreadyHeld(item_id.to_string()));
        }

        let handle = self.factory.create(file)?;
        state.handles.insert(item_id, handle.clone());
        state.stats.acquired += 1;
        debug!(item_id = %item_id, "Acquired preview lease");
        Ok(handle)
    }

    /// Revoke the handle for `item_id`. Returns whether one was live.
    pub fn release(&self, item_id: QueueItemId) -> bool {
        let handle = {
            let mut state = self.lock();
            let handle = state.handles.remove(&item_id);
            if handle.is_some() {
                state.stats.released += 1;
            }
            handle
        };

        match handle {
            Some(handle) => {
                self.factory.revoke(&handle);
                debug!(item_id = %item_id, "Released preview lease");
                true
            }
            None => false,
        }
    }

    /// Revoke every outstanding handle and refuse further acquisitions.
    ///
    /// Only the first call does any work; it returns the number of handles
    /// revoked.
    pub fn release_all(&self) -> usize {
        let handles: Vec<PreviewUrl> = {
            let mut state = self.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            let handles: Vec<PreviewUrl> = state.handles.drain().map(|(_, h)| h).collect();
            state.stats.released += handles.len() as u64;
            handles
        };

        for handle in &handles {
            self.factory.revoke(handle);
        }
        info!(count = handles.len(), "Released all preview leases");
        handles.len()
    }

    pub fn is_held(&self, item_id: QueueItemId) -> bool {
        self.lock().handles.contains_key(&item_id)
    }

    pub fn handle(&self, item_id: QueueItemId) -> Option<PreviewUrl> {
        self.lock().handles.get(&item_id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn stats(&self) -> LeaseStats {
        self.lock().stats
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, LeaseState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for LeaseTracker {
    fn drop(&mut self) {
        self.release_all();
    }
}
