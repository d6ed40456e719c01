// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! One module per demo. Each sizes its scenario from its args, runs it on
//! real threads inside the global time budget and returns a `Report`.

pub mod bank;
pub mod buffer;
pub mod printers;
pub mod readers;

use std::time::Duration;

use semgate_sync::run_with_deadline;

use crate::error::CliError;

/// Run a scenario on its own thread, failing if it outlives `budget`.
fn within_budget<T, F>(budget: Duration, scenario: F) -> Result<T, CliError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CliError> + Send + 'static,
{
    run_with_deadline(budget, scenario).map_err(|_| CliError::DeadlineExceeded(budget))?
}
