// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Failures that stop a demo run.

use std::time::Duration;

use semgate_sync::{JoinError, SyncError, TransferError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("could not start task: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The run did not finish in time; most likely it deadlocked.
    #[error("run did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("could not encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Extra advice printed under the error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CliError::DeadlineExceeded(_) => {
                Some("raise --deadline-ms if the machine is just slow")
            }
            CliError::Sync(SyncError::ZeroCapacity) => Some("sizes must be at least 1"),
            _ => None,
        }
    }
}
