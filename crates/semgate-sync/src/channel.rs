// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bounded producer/consumer buffer.
//!
//! Three gates over one FIFO queue:
//! - `empty_slots` starts at `capacity`, taken by `put`
//! - `filled_slots` starts at 0, taken by `take`
//! - the queue's own mutex, the binary gate around the push/pop
//!
//! Order is always capacity gate → mutex → release mutex → counterpart
//! gate. The mutex is never held while blocked on a capacity gate.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::cancel::CancelToken;
use crate::error::SyncError;
use crate::semaphore::Semaphore;

/// Fixed-capacity FIFO handing items from producers to consumers with
/// backpressure. Share it behind an `Arc`.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    items: Mutex<VecDeque<T>>,
    empty_slots: Semaphore,
    filled_slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedChannel<T> {
    pub fn new(capacity: usize) -> Result<Self, SyncError> {
        if capacity == 0 {
            return Err(SyncError::ZeroCapacity);
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            empty_slots: Semaphore::bounded(capacity, capacity),
            filled_slots: Semaphore::bounded(0, capacity),
            capacity,
        })
    }

    /// Append `item`, blocking while the buffer is full.
    pub fn put(&self, item: T) {
        self.empty_slots.acquire();
        self.push(item);
    }

    /// Remove the oldest item, blocking while the buffer is empty.
    pub fn take(&self) -> T {
        self.filled_slots.acquire();
        self.pop()
    }

    /// `put` that gives up on cancellation and hands the item back.
    pub fn put_cancellable(&self, item: T, token: &CancelToken) -> Result<(), T> {
        if self.empty_slots.acquire_cancellable(token).is_acquired() {
            self.push(item);
            Ok(())
        } else {
            Err(item)
        }
    }

    /// `take` that gives up on cancellation.
    pub fn take_cancellable(&self, token: &CancelToken) -> Option<T> {
        if self.filled_slots.acquire_cancellable(token).is_acquired() {
            Some(self.pop())
        } else {
            None
        }
    }

    /// Append without blocking. A full buffer returns the item.
    pub fn try_put(&self, item: T) -> Result<(), T> {
        if self.empty_slots.try_acquire() {
            self.push(item);
            Ok(())
        } else {
            Err(item)
        }
    }

    pub fn try_take(&self) -> Option<T> {
        if self.filled_slots.try_acquire() {
            Some(self.pop())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock_items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds an empty slot.
    fn push(&self, item: T) {
        {
            let mut items = self.lock_items();
            debug_assert!(items.len() < self.capacity);
            items.push_back(item);
            trace!(len = items.len(), "item put");
        }
        self.filled_slots.signal();
    }

    /// Caller holds a filled slot.
    fn pop(&self) -> T {
        let item = {
            let mut items = self.lock_items();
            let Some(item) = items.pop_front() else {
                unreachable!("filled slot held but queue is empty");
            };
            trace!(len = items.len(), "item taken");
            item
        };
        self.empty_slots.signal();
        item
    }
}
