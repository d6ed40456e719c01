// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Counting semaphore built from a mutex and a condition variable.
//!
//! `acquire` waits inside the lock while no permit is available, then
//! takes one. `release` puts one back and wakes a waiter. The lock only
//! ever covers the permit bookkeeping, never the caller's work.
//!
//! Fair mode hands out tickets: a waiter may only take a permit once its
//! ticket is at the head of the queue, and newcomers never barge past a
//! non-empty queue. Because a single condvar cannot target one thread,
//! fair releases wake every waiter and all but the head go back to sleep.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, trace, warn};

use crate::cancel::{Acquire, CancelToken, CANCEL_POLL_INTERVAL};
use crate::error::{SyncError, TimedOut};

/// Construction parameters for a [`Semaphore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreConfig {
    /// Permits available at creation.
    pub permits: usize,
    /// Upper bound on available permits. `None` means unbounded.
    pub capacity: Option<usize>,
    /// Serve waiters in arrival order.
    pub fair: bool,
}

impl SemaphoreConfig {
    pub fn new(permits: usize) -> Self {
        Self {
            permits,
            capacity: None,
            fair: false,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    pub fn build(self) -> Semaphore {
        Semaphore::with_config(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Acquired,
    Cancelled,
    TimedOut,
}

#[derive(Debug)]
struct State {
    permits: usize,
    /// Threads currently blocked in `wait`.
    waiting: usize,
    /// Fair mode only: tickets in arrival order.
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl State {
    fn enqueue(&mut self, fair: bool) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiting += 1;
        if fair {
            self.queue.push_back(ticket);
        }
        ticket
    }

    fn leave(&mut self, ticket: u64, fair: bool) {
        self.waiting -= 1;
        if fair {
            if let Some(pos) = self.queue.iter().position(|&t| t == ticket) {
                self.queue.remove(pos);
            }
        }
    }

    fn can_take(&self, fair: bool, ticket: Option<u64>) -> bool {
        if self.permits == 0 {
            return false;
        }
        if !fair {
            return true;
        }
        match ticket {
            Some(ticket) => self.queue.front() == Some(&ticket),
            None => self.queue.is_empty(),
        }
    }
}

/// A counting semaphore. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    cond: Condvar,
    capacity: Option<usize>,
    fair: bool,
}

impl Semaphore {
    /// Unbounded, unfair semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        SemaphoreConfig::new(permits).build()
    }

    /// Semaphore whose available permits may never exceed `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `permits > capacity`.
    pub fn bounded(permits: usize, capacity: usize) -> Self {
        SemaphoreConfig::new(permits).capacity(capacity).build()
    }

    /// First-come-first-served semaphore bounded at its initial permit count.
    pub fn fair(permits: usize) -> Self {
        SemaphoreConfig::new(permits)
            .capacity(permits)
            .fair(true)
            .build()
    }

    /// # Panics
    ///
    /// Panics if the initial permits exceed the configured capacity.
    pub fn with_config(config: SemaphoreConfig) -> Self {
        if let Some(capacity) = config.capacity {
            assert!(
                config.permits <= capacity,
                "initial permits {} exceed capacity {}",
                config.permits,
                capacity
            );
        }
        Self {
            state: Mutex::new(State {
                permits: config.permits,
                waiting: 0,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            cond: Condvar::new(),
            capacity: config.capacity,
            fair: config.fair,
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let outcome = self.wait(None, None);
        debug_assert_eq!(outcome, Wait::Acquired);
    }

    /// Like `acquire`, but gives up once `token` is cancelled.
    ///
    /// A cancelled wait takes nothing and leaves no trace in the queue.
    pub fn acquire_cancellable(&self, token: &CancelToken) -> Acquire {
        self.acquire_with(Some(token))
    }

    /// Like `acquire`, but gives up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), TimedOut> {
        match self.wait(None, Some(Instant::now() + timeout)) {
            Wait::Acquired => Ok(()),
            _ => Err(TimedOut),
        }
    }

    /// Take a permit only if one is free right now.
    ///
    /// In fair mode this also fails while anyone is queued.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock_state();
        if state.can_take(self.fair, None) {
            state.permits -= 1;
            trace!(permits = state.permits, "permit taken without waiting");
            true
        } else {
            false
        }
    }

    /// Return a permit and wake a waiter.
    ///
    /// On a bounded semaphore that is already full this is a bug in the
    /// caller's protocol: the count is left alone and an error returned.
    pub fn release(&self) -> Result<(), SyncError> {
        let state = self.lock_state();
        if let Some(capacity) = self.capacity {
            if state.permits >= capacity {
                error!(capacity, "semaphore released past its capacity");
                return Err(SyncError::CapacityExceeded { capacity });
            }
        }
        self.add_permit(state);
        Ok(())
    }

    /// Run `f` while holding one permit. The permit goes back even if `f` panics.
    pub fn with_permit<R, F: FnOnce() -> R>(&self, f: F) -> R {
        self.acquire();
        let _permit = PermitReturn(self);
        f()
    }

    pub fn available_permits(&self) -> usize {
        self.lock_state().permits
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_fair(&self) -> bool {
        self.fair
    }

    /// Number of threads currently blocked in an acquire.
    pub fn queued_waiters(&self) -> usize {
        self.lock_state().waiting
    }

    /// Blocking acquire with an optional cancellation token.
    pub(crate) fn acquire_with(&self, token: Option<&CancelToken>) -> Acquire {
        match self.wait(token, None) {
            Wait::Acquired => Acquire::Acquired,
            _ => Acquire::Cancelled,
        }
    }

    /// Return a permit the caller is known to hold.
    ///
    /// Used by composite primitives whose own bookkeeping already rules
    /// out an over-release.
    pub(crate) fn signal(&self) {
        let state = self.lock_state();
        self.add_permit(state);
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_permit(&self, mut state: MutexGuard<'_, State>) {
        state.permits += 1;
        let waiting = state.waiting;
        trace!(permits = state.permits, waiting, "permit released");
        drop(state);
        if waiting > 0 {
            self.wake();
        }
    }

    fn wake(&self) {
        if self.fair {
            self.cond.notify_all();
        } else {
            self.cond.notify_one();
        }
    }

    /// A waiter left without taking a permit; it may have swallowed the
    /// wakeup meant for someone else.
    fn pass_on(&self, state: &State) {
        if state.permits > 0 && state.waiting > 0 {
            self.wake();
        }
    }

    fn wait(&self, token: Option<&CancelToken>, deadline: Option<Instant>) -> Wait {
        let mut state = self.lock_state();
        if state.can_take(self.fair, None) {
            state.permits -= 1;
            trace!(permits = state.permits, "permit taken without waiting");
            return Wait::Acquired;
        }

        let ticket = state.enqueue(self.fair);
        loop {
            if token.is_some_and(CancelToken::is_cancelled) {
                state.leave(ticket, self.fair);
                self.pass_on(&state);
                warn!(ticket, "semaphore wait cancelled");
                return Wait::Cancelled;
            }

            if state.can_take(self.fair, Some(ticket)) {
                state.leave(ticket, self.fair);
                state.permits -= 1;
                trace!(ticket, permits = state.permits, "permit taken after waiting");
                // The next ticket may be satisfiable as well.
                if self.fair {
                    self.pass_on(&state);
                }
                return Wait::Acquired;
            }

            let mut timeout = token.map(|_| CANCEL_POLL_INTERVAL);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    state.leave(ticket, self.fair);
                    self.pass_on(&state);
                    warn!(ticket, "semaphore wait timed out");
                    return Wait::TimedOut;
                }
                let left = deadline - now;
                timeout = Some(timeout.map_or(left, |poll| poll.min(left)));
            }

            state = match timeout {
                Some(dur) => {
                    self.cond
                        .wait_timeout(state, dur)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

struct PermitReturn<'a>(&'a Semaphore);

impl Drop for PermitReturn<'_> {
    fn drop(&mut self) {
        self.0.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{init_test_logging, wait_until};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;

    #[test]
    fn acquire_and_release() {
        let sem = Semaphore::new(2);
        sem.acquire();
        sem.acquire();
        assert_eq!(sem.available_permits(), 0);
        sem.release().unwrap();
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn acquire_blocks_until_release() {
        init_test_logging();
        let sem = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || {
                sem.acquire();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        sem.release().unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn release_past_capacity_is_reported() {
        let sem = Semaphore::bounded(1, 1);
        assert_eq!(
            sem.release(),
            Err(SyncError::CapacityExceeded { capacity: 1 })
        );
        assert_eq!(sem.available_permits(), 1);

        sem.acquire();
        assert!(sem.release().is_ok());
    }

    #[test]
    #[should_panic(expected = "exceed capacity")]
    fn initial_permits_above_capacity_panics() {
        let _ = Semaphore::bounded(3, 2);
    }

    #[test]
    fn try_acquire_does_not_block() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn timed_out_acquire_takes_nothing() {
        let sem = Semaphore::new(0);
        assert_eq!(sem.acquire_timeout(Duration::from_millis(20)), Err(TimedOut));
        assert_eq!(sem.available_permits(), 0);
        assert_eq!(sem.queued_waiters(), 0);
    }

    #[test]
    fn cancelled_acquire_leaves_state_unchanged() {
        let sem = Arc::new(Semaphore::bounded(0, 1));
        let token = CancelToken::new();
        let waiter = {
            let sem = sem.clone();
            let token = token.clone();
            thread::spawn(move || sem.acquire_cancellable(&token))
        };

        wait_until(|| sem.queued_waiters() == 1);
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Acquire::Cancelled);
        assert_eq!(sem.available_permits(), 0);
        assert_eq!(sem.queued_waiters(), 0);

        // The permit that arrives later is still there for the next caller.
        sem.release().unwrap();
        assert!(sem.try_acquire());
    }

    #[test]
    fn cancelled_waiter_passes_wakeup_on() {
        let sem = Arc::new(Semaphore::new(0));
        let token = CancelToken::new();
        let cancellable = {
            let sem = sem.clone();
            let token = token.clone();
            thread::spawn(move || sem.acquire_cancellable(&token))
        };
        wait_until(|| sem.queued_waiters() == 1);
        let plain = {
            let sem = sem.clone();
            thread::spawn(move || sem.acquire())
        };
        wait_until(|| sem.queued_waiters() == 2);

        token.cancel();
        sem.release().unwrap();
        plain.join().unwrap();
        assert_eq!(cancellable.join().unwrap(), Acquire::Cancelled);
        assert_eq!(sem.queued_waiters(), 0);
    }

    #[test]
    fn permits_stay_within_bounds_under_contention() {
        const LIMIT: usize = 3;
        let sem = Arc::new(Semaphore::bounded(LIMIT, LIMIT));
        let holders = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sem = sem.clone();
                let holders = holders.clone();
                let peak = peak.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        sem.with_permit(|| {
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            thread::yield_now();
                            holders.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= LIMIT);
        assert_eq!(sem.available_permits(), LIMIT);
    }

    #[test]
    fn with_permit_returns_permit_on_panic() {
        let sem = Arc::new(Semaphore::bounded(1, 1));
        let result = {
            let sem = sem.clone();
            thread::spawn(move || sem.with_permit(|| panic!("boom"))).join()
        };
        assert!(result.is_err());
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn fair_mode_serves_in_arrival_order() {
        let sem = Arc::new(Semaphore::fair(1));
        sem.acquire();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let sem_c = sem.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                sem_c.acquire();
                order.lock().unwrap().push(i);
                sem_c.release().unwrap();
            }));
            wait_until(|| sem.queued_waiters() == i + 1);
        }

        sem.release().unwrap();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn fair_try_acquire_does_not_barge() {
        let sem = Arc::new(Semaphore::fair(1));
        sem.acquire();
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.acquire())
        };
        wait_until(|| sem.queued_waiters() == 1);
        assert!(!sem.try_acquire());
        sem.release().unwrap();
        waiter.join().unwrap();
        assert_eq!(sem.available_permits(), 0);
    }
}
