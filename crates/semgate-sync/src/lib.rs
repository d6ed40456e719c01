// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Blocking coordination primitives for OS threads.
//!
//! Components, leaves first:
//! - semaphore: counting semaphore from a mutex + condvar, optional fairness
//! - channel: bounded producer/consumer buffer over three gates
//! - gate: reader-writer gate, first reader locks, last reader unlocks
//! - transfer: accounts moved under two locks taken in identity order
//! - pool: fair pool of interchangeable resources
//! - cancel/task/deadline: cancellation tokens, named tasks, time budgets

pub mod cancel;
pub mod channel;
pub mod deadline;
pub mod error;
pub mod gate;
pub mod pool;
pub mod semaphore;
pub mod task;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use cancel::{Acquire, CancelToken};
pub use channel::BoundedChannel;
pub use deadline::run_with_deadline;
pub use error::{JoinError, SyncError, TimedOut, TransferError};
pub use gate::{GateState, Guarded, ReaderWriterGate};
pub use pool::ResourcePool;
pub use semaphore::{Semaphore, SemaphoreConfig};
pub use task::{spawn, TaskHandle};
pub use transfer::{transfer, Account, AccountId, Bank, Receipt};
