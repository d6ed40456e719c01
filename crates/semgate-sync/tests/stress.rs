// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Stress runs for the whole-system properties: writer exclusion under
//! contention, deadlock-free transfers, bounded channel conservation.
//! Every run is wrapped in a time budget so a deadlock fails instead of
//! hanging the suite.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use semgate_sync::{
    run_with_deadline, spawn, transfer, Bank, BoundedChannel, GateState, ReaderWriterGate,
    ResourcePool, Semaphore, TransferError,
};

const BUDGET: Duration = Duration::from_secs(60);

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn writers_never_overlap_readers() {
    init_logging();
    let violations = run_with_deadline(BUDGET, || {
        let gate = Arc::new(ReaderWriterGate::new());
        let readers_inside = Arc::new(AtomicUsize::new(0));
        let writer_inside = Arc::new(AtomicBool::new(false));
        let violations = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for r in 0..12 {
            let gate = gate.clone();
            let readers_inside = readers_inside.clone();
            let writer_inside = writer_inside.clone();
            let violations = violations.clone();
            tasks.push(
                spawn(format!("reader-{r}"), move |_| {
                    for _ in 0..300 {
                        gate.read(|| {
                            readers_inside.fetch_add(1, Ordering::SeqCst);
                            if writer_inside.load(Ordering::SeqCst) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::yield_now();
                            readers_inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
                .unwrap(),
            );
        }
        for w in 0..3 {
            let gate = gate.clone();
            let readers_inside = readers_inside.clone();
            let writer_inside = writer_inside.clone();
            let violations = violations.clone();
            tasks.push(
                spawn(format!("writer-{w}"), move |_| {
                    for _ in 0..100 {
                        gate.write(|| {
                            if writer_inside.swap(true, Ordering::SeqCst) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            if readers_inside.load(Ordering::SeqCst) > 0
                                || gate.reader_count() > 0
                            {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::yield_now();
                            writer_inside.store(false, Ordering::SeqCst);
                        });
                    }
                })
                .unwrap(),
            );
        }
        for task in tasks {
            task.join().unwrap();
        }
        assert_eq!(gate.state(), GateState::Idle);
        violations.load(Ordering::SeqCst)
    });
    assert_eq!(violations, Ok(0));
}

#[test]
fn thousand_transfers_each_way_complete() {
    init_logging();
    let balances = run_with_deadline(BUDGET, || {
        let bank = Bank::new();
        let a = bank.open(1000);
        let b = bank.open(0);

        // 10 tasks per direction, 100 transfers of 1 each.
        let mut tasks = Vec::new();
        for i in 0..20 {
            let (from, to) = if i % 2 == 0 {
                (a.clone(), b.clone())
            } else {
                (b.clone(), a.clone())
            };
            tasks.push(
                spawn(format!("transfer-{i}"), move |_| {
                    for _ in 0..100 {
                        match transfer(&from, &to, 1) {
                            Ok(_) | Err(TransferError::InsufficientFunds { .. }) => {}
                            Err(other) => panic!("unexpected transfer error: {other}"),
                        }
                    }
                })
                .unwrap(),
            );
        }
        for task in tasks {
            task.join().unwrap();
        }
        (a.balance(), b.balance(), bank.total())
    });

    let (a, b, total) = balances.expect("transfers deadlocked");
    assert_eq!(a + b, 1000);
    assert_eq!(total, 1000);
}

#[test]
fn transfers_around_a_ring_conserve_money() {
    init_logging();
    const ACCOUNTS: usize = 6;
    let total = run_with_deadline(BUDGET, || {
        let bank = Arc::new(Bank::new());
        let accounts: Vec<_> = (0..ACCOUNTS).map(|_| bank.open(500)).collect();

        let tasks: Vec<_> = (0..ACCOUNTS)
            .map(|i| {
                let from = accounts[i].clone();
                let to = accounts[(i + 1) % ACCOUNTS].clone();
                let back = accounts[(i + ACCOUNTS - 1) % ACCOUNTS].clone();
                let bank = bank.clone();
                spawn(format!("ring-{i}"), move |_| {
                    for n in 0..500u64 {
                        let _ = transfer(&from, &to, n % 7);
                        let _ = transfer(&from, &back, n % 5);
                        if n % 100 == 0 {
                            assert_eq!(bank.total(), (ACCOUNTS * 500) as u128);
                        }
                    }
                })
                .unwrap()
            })
            .collect();
        for task in tasks {
            task.join().unwrap();
        }
        bank.total()
    });
    assert_eq!(total, Ok((ACCOUNTS * 500) as u128));
}

#[test]
fn channel_delivers_every_item_exactly_once() {
    init_logging();
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: u64 = 500;

    let (sum, count) = run_with_deadline(BUDGET, || {
        let ch = Arc::new(BoundedChannel::new(5).unwrap());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ch = ch.clone();
                spawn(format!("producer-{p}"), move |_| {
                    for i in 0..PER_PRODUCER {
                        ch.put(Some(p * PER_PRODUCER + i));
                    }
                })
                .unwrap()
            })
            .collect();
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|c| {
                let ch = ch.clone();
                spawn(format!("consumer-{c}"), move |_| {
                    let (mut sum, mut count) = (0u64, 0u64);
                    while let Some(v) = ch.take() {
                        sum += v;
                        count += 1;
                    }
                    (sum, count)
                })
                .unwrap()
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for _ in 0..CONSUMERS {
            ch.put(None);
        }
        consumers
            .into_iter()
            .map(|c| c.join().unwrap())
            .fold((0, 0), |(s, n), (cs, cn)| (s + cs, n + cn))
    })
    .expect("channel run deadlocked");

    let n = PRODUCERS * PER_PRODUCER;
    assert_eq!(count, n);
    assert_eq!(sum, n * (n - 1) / 2);
}

#[test]
fn pool_and_semaphore_return_to_full() {
    init_logging();
    let (pool_left, sem_left) = run_with_deadline(BUDGET, || {
        let pool = Arc::new(ResourcePool::new(3).unwrap());
        let sem = Arc::new(Semaphore::bounded(2, 2));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let pool = pool.clone();
                let sem = sem.clone();
                spawn(format!("user-{i}"), move |_| {
                    for _ in 0..50 {
                        pool.with_resource(|| sem.with_permit(thread::yield_now));
                    }
                })
                .unwrap()
            })
            .collect();
        for t in tasks {
            t.join().unwrap();
        }
        (pool.available(), sem.available_permits())
    })
    .expect("pool run deadlocked");
    assert_eq!(pool_left, 3);
    assert_eq!(sem_left, 2);
}
