// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative cancellation.
//!
//! A shared flag. Blocked waiters re-check it every `CANCEL_POLL_INTERVAL`
//! and give up without touching the state they were waiting on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often a cancellable wait wakes to look at its token.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Cancellation token shared between a waiter and whoever may cancel it.
///
/// Cloning is cheap and every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cancellation flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Result of a wait that can be abandoned.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// The permit (or gate) is now held by the caller.
    Acquired,
    /// The wait was abandoned; nothing was taken.
    Cancelled,
}

impl Acquire {
    pub fn is_acquired(self) -> bool {
        matches!(self, Acquire::Acquired)
    }
}
