// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Fair pool of interchangeable resources (printers, connections, ...).
//!
//! Pure counting: which resource a holder gets is not tracked.

use tracing::debug;

use crate::cancel::{Acquire, CancelToken};
use crate::error::SyncError;
use crate::semaphore::Semaphore;

#[derive(Debug)]
pub struct ResourcePool {
    size: usize,
    gate: Semaphore,
}

impl ResourcePool {
    /// Pool of `size` resources, handed out first-come-first-served.
    pub fn new(size: usize) -> Result<Self, SyncError> {
        if size == 0 {
            return Err(SyncError::ZeroCapacity);
        }
        Ok(Self {
            size,
            gate: Semaphore::fair(size),
        })
    }

    /// Block until a resource is free, in arrival order.
    pub fn acquire_resource(&self) {
        self.gate.acquire();
        debug!(available = self.available(), "resource acquired");
    }

    pub fn acquire_resource_cancellable(&self, token: &CancelToken) -> Acquire {
        self.gate.acquire_cancellable(token)
    }

    pub fn try_acquire_resource(&self) -> bool {
        self.gate.try_acquire()
    }

    /// Hand a resource back. Returning more than were taken is an error.
    pub fn release_resource(&self) -> Result<(), SyncError> {
        self.gate.release()?;
        debug!(available = self.available(), "resource released");
        Ok(())
    }

    /// Hold one resource for the duration of `f`.
    pub fn with_resource<R, F: FnOnce() -> R>(&self, f: F) -> R {
        self.gate.with_permit(f)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.gate.available_permits()
    }

    /// Requesters currently queued for a resource.
    pub fn waiting(&self) -> usize {
        self.gate.queued_waiters()
    }
}
