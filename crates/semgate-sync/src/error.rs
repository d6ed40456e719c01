// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error types for the coordination primitives.
//!
//! Two families: `SyncError` is a programmer error in the calling
//! protocol (release past capacity, unmatched end). `TransferError` is an
//! expected domain outcome and carries enough context to report it.

use thiserror::Error;

use crate::transfer::AccountId;

/// Contract violations on a primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// `release()` would push the permit count past its declared bound.
    #[error("release would exceed semaphore capacity of {capacity}")]
    CapacityExceeded { capacity: usize },

    /// An `end_*` call with no matching `begin_*`.
    #[error("unmatched release on {primitive}")]
    UnmatchedRelease { primitive: &'static str },

    /// A buffer or pool was created with room for nothing.
    #[error("capacity must be at least 1")]
    ZeroCapacity,
}

/// Why a transfer did not happen. Balances are untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: u64,
        requested: u64,
    },

    /// Source and destination are the same account.
    #[error("cannot transfer from {0} to itself")]
    SameAccount(AccountId),

    /// Crediting the destination would overflow its balance.
    #[error("balance of {0} would overflow")]
    BalanceOverflow(AccountId),
}

/// Error returned by `TaskHandle::join()` when the task did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// Task panicked with the given message.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// Task was cancelled and its thread went down without a result.
    #[error("task was cancelled")]
    Cancelled,
}

/// A bounded wait ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out")]
pub struct TimedOut;
