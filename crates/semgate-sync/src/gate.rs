// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reader-writer gate from two binary semaphores and a reader count.
//!
//! `mutex` serializes changes to the reader count. `exclusive` is held
//! either by the whole group of active readers or by one writer. The
//! first reader in takes `exclusive` (waiting out any writer while still
//! holding `mutex`, so later readers queue behind it); the last reader out
//! gives it back.
//!
//! Readers are preferred: a steady stream of overlapping readers keeps
//! `exclusive` held and a waiting writer starves. That is a property of
//! the two-semaphore scheme and is kept as is.

use std::cell::UnsafeCell;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::cancel::{Acquire, CancelToken};
use crate::error::SyncError;
use crate::semaphore::Semaphore;

/// Observable state of a gate.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Reading(usize),
    Writing,
}

#[derive(Debug, Default)]
struct Counts {
    readers: usize,
    writer: bool,
}

/// Many concurrent readers or exactly one writer.
#[derive(Debug)]
pub struct ReaderWriterGate {
    mutex: Semaphore,
    exclusive: Semaphore,
    /// Only ever locked briefly, never across a wait.
    counts: Mutex<Counts>,
}

impl Default for ReaderWriterGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderWriterGate {
    pub fn new() -> Self {
        Self {
            mutex: Semaphore::bounded(1, 1),
            exclusive: Semaphore::bounded(1, 1),
            counts: Mutex::new(Counts::default()),
        }
    }

    pub fn begin_read(&self) {
        let outcome = self.enter_read(None);
        debug_assert_eq!(outcome, Acquire::Acquired);
    }

    /// `begin_read` that can be abandoned. A cancelled reader is not counted.
    pub fn begin_read_cancellable(&self, token: &CancelToken) -> Acquire {
        self.enter_read(Some(token))
    }

    /// Leave a read section. The last reader out reopens the gate for writers.
    pub fn end_read(&self) -> Result<(), SyncError> {
        self.mutex.acquire();
        let result = {
            let mut counts = self.lock_counts();
            if counts.readers == 0 {
                Err(SyncError::UnmatchedRelease {
                    primitive: "reader-writer gate (read)",
                })
            } else {
                counts.readers -= 1;
                Ok(counts.readers == 0)
            }
        };
        match result {
            Ok(true) => {
                self.exclusive.signal();
                debug!("last reader left, gate idle");
            }
            Ok(false) => {}
            Err(ref err) => error!(%err, "end_read without begin_read"),
        }
        self.mutex.signal();
        result.map(|_| ())
    }

    pub fn begin_write(&self) {
        let outcome = self.enter_write(None);
        debug_assert_eq!(outcome, Acquire::Acquired);
    }

    pub fn begin_write_cancellable(&self, token: &CancelToken) -> Acquire {
        self.enter_write(Some(token))
    }

    pub fn end_write(&self) -> Result<(), SyncError> {
        {
            let mut counts = self.lock_counts();
            if !counts.writer {
                let err = SyncError::UnmatchedRelease {
                    primitive: "reader-writer gate (write)",
                };
                error!(%err, "end_write without begin_write");
                return Err(err);
            }
            counts.writer = false;
        }
        self.exclusive.signal();
        debug!("writer left, gate idle");
        Ok(())
    }

    /// Run `f` inside a read section.
    pub fn read<R, F: FnOnce() -> R>(&self, f: F) -> R {
        self.begin_read();
        let _section = Section {
            gate: self,
            write: false,
        };
        f()
    }

    /// Run `f` inside a write section.
    pub fn write<R, F: FnOnce() -> R>(&self, f: F) -> R {
        self.begin_write();
        let _section = Section {
            gate: self,
            write: true,
        };
        f()
    }

    pub fn state(&self) -> GateState {
        let counts = self.lock_counts();
        if counts.writer {
            GateState::Writing
        } else if counts.readers > 0 {
            GateState::Reading(counts.readers)
        } else {
            GateState::Idle
        }
    }

    pub fn reader_count(&self) -> usize {
        self.lock_counts().readers
    }

    fn lock_counts(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter_read(&self, token: Option<&CancelToken>) -> Acquire {
        if self.mutex.acquire_with(token) == Acquire::Cancelled {
            return Acquire::Cancelled;
        }
        let first = self.lock_counts().readers == 0;
        if first && self.exclusive.acquire_with(token) == Acquire::Cancelled {
            self.mutex.signal();
            return Acquire::Cancelled;
        }
        let readers = {
            let mut counts = self.lock_counts();
            counts.readers += 1;
            counts.readers
        };
        if first {
            debug!("first reader entered, writers locked out");
        }
        debug!(readers, "reader entered");
        self.mutex.signal();
        Acquire::Acquired
    }

    fn enter_write(&self, token: Option<&CancelToken>) -> Acquire {
        if self.exclusive.acquire_with(token) == Acquire::Cancelled {
            return Acquire::Cancelled;
        }
        let mut counts = self.lock_counts();
        debug_assert_eq!(counts.readers, 0);
        counts.writer = true;
        debug!("writer entered");
        Acquire::Acquired
    }
}

/// Ends a closure-scoped section, including on unwind.
struct Section<'a> {
    gate: &'a ReaderWriterGate,
    write: bool,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        let result = if self.write {
            self.gate.end_write()
        } else {
            self.gate.end_read()
        };
        // Already logged by end_*; a section always matches its begin.
        debug_assert!(result.is_ok());
    }
}

/// A value behind a `ReaderWriterGate`, with closure-scoped access.
///
/// The gate alone decides who may touch the value: readers share `&T`,
/// a writer gets `&mut T` with everyone else excluded. The gate stays
/// private so only `read` and `write` can open or end a section.
pub struct Guarded<T> {
    gate: ReaderWriterGate,
    value: UnsafeCell<T>,
}

// Safety: the gate admits either any number of readers (shared `&T`,
// hence `T: Sync`) or a single writer (`&mut T` possibly on another
// thread, hence `T: Send`), never both.
unsafe impl<T: Send + Sync> Sync for Guarded<T> {}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self {
            gate: ReaderWriterGate::new(),
            value: UnsafeCell::new(value),
        }
    }

    pub fn read<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
        // Safety: inside a read section no writer is active.
        self.gate.read(|| f(unsafe { &*self.value.get() }))
    }

    pub fn write<R, F: FnOnce(&mut T) -> R>(&self, f: F) -> R {
        // Safety: inside a write section this is the only access.
        self.gate.write(|| f(unsafe { &mut *self.value.get() }))
    }

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    pub fn reader_count(&self) -> usize {
        self.gate.reader_count()
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T> std::fmt::Debug for Guarded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Reading the value here could deadlock a thread that holds the
        // write section, so only the gate is shown.
        f.debug_struct("Guarded")
            .field("state", &self.gate.state())
            .finish_non_exhaustive()
    }
}
