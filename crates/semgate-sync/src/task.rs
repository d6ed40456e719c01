// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Named tasks on OS threads with a cancellation token and join.
//!
//! Panics inside a task are caught and surface as `JoinError::Panicked`.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::JoinError;

/// Handle to a spawned task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    name: String,
    handle: JoinHandle<Result<T, String>>,
    token: CancelToken,
}

impl<T> TaskHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The token handed to the task body.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to complete, returning its result.
    pub fn join(self) -> Result<T, JoinError> {
        match self.handle.join() {
            Ok(Ok(val)) => Ok(val),
            Ok(Err(msg)) => Err(JoinError::Panicked(msg)),
            Err(_) => Err(JoinError::Panicked("thread panicked".to_string())),
        }
    }

    /// Request cooperative cancellation, then wait for exit.
    ///
    /// A task that notices the token and returns normally still yields
    /// its value. A panic is reported as `Panicked`, not `Cancelled`.
    pub fn cancel(self) -> Result<T, JoinError> {
        debug!(task = %self.name, "cancelling task");
        self.token.cancel();
        match self.handle.join() {
            Ok(Ok(val)) => Ok(val),
            Ok(Err(msg)) => Err(JoinError::Panicked(msg)),
            Err(_) => Err(JoinError::Cancelled),
        }
    }
}

/// Spawn `f` on a new OS thread called `name`.
///
/// `f` receives a clone of the task's `CancelToken` to pass into
/// cancellable waits.
pub fn spawn<T, F>(name: impl Into<String>, f: F) -> io::Result<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> T + Send + 'static,
{
    let name = name.into();
    let token = CancelToken::new();
    let task_token = token.clone();
    let task_name = name.clone();

    let handle = thread::Builder::new().name(name.clone()).spawn(move || {
        match panic::catch_unwind(AssertUnwindSafe(|| f(task_token))) {
            Ok(val) => Ok(val),
            Err(e) => {
                let msg = if let Some(s) = e.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = e.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!(task = %task_name, %msg, "task panicked");
                Err(msg)
            }
        }
    })?;

    Ok(TaskHandle {
        name,
        handle,
        token,
    })
}
