// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Time budgets for whole runs.
//!
//! The work runs on its own thread and the caller races it against a
//! timer. Used to turn "this must not deadlock" into a failing result.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::error;

use crate::error::TimedOut;

/// Run `f` and wait at most `budget` for it.
///
/// On timeout the worker thread is left behind: a deadlocked run cannot
/// be stopped from outside, only reported. A panic in `f` resumes on the
/// calling thread.
pub fn run_with_deadline<T, F>(budget: Duration, f: F) -> Result<T, TimedOut>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        // The receiver is gone only if the budget already expired.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(budget) {
        Ok(Ok(val)) => Ok(val),
        Ok(Err(payload)) => panic::resume_unwind(payload),
        Err(_) => {
            error!(?budget, "run exceeded its time budget");
            Err(TimedOut)
        }
    }
}
