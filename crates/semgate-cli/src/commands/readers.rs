// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Readers and writers sharing one book through a reader-writer gate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use semgate_sync::{spawn, GateState, Guarded};
use tracing::info;

use super::within_budget;
use crate::error::CliError;
use crate::report::Report;

#[derive(Debug, Clone, Args)]
pub struct ReadersArgs {
    #[arg(long, default_value_t = 6)]
    pub readers: usize,

    #[arg(long, default_value_t = 1)]
    pub writers: usize,

    /// Reads per reader and writes per writer
    #[arg(long, default_value_t = 3)]
    pub rounds: usize,

    /// Time spent inside each read or write, in milliseconds
    #[arg(long, default_value_t = 20)]
    pub work_ms: u64,
}

struct Outcome {
    reads: usize,
    writes: usize,
    peak_readers: usize,
    overlaps: usize,
    final_value: i64,
    final_state: GateState,
}

pub fn run(args: ReadersArgs, budget: Duration) -> Result<Report, CliError> {
    let started = Instant::now();
    let sizing = args.clone();
    let outcome = within_budget(budget, move || simulate(sizing))?;

    Ok(Report::new("readers", started.elapsed())
        .fact("readers", args.readers)
        .fact("writers", args.writers)
        .fact("reads", outcome.reads)
        .fact("writes", outcome.writes)
        .fact("peak_concurrent_readers", outcome.peak_readers)
        .fact("final_value", outcome.final_value)
        .fact("final_state", serde_json::to_value(outcome.final_state)?)
        .check("no write overlapped a read", outcome.overlaps == 0)
        .check(
            "every read and write happened",
            outcome.reads == args.readers * args.rounds
                && outcome.writes == args.writers * args.rounds,
        )
        .check("gate idle at the end", outcome.final_state == GateState::Idle))
}

fn simulate(args: ReadersArgs) -> Result<Outcome, CliError> {
    let book = Arc::new(Guarded::new(0i64));
    let reads = Arc::new(AtomicUsize::new(0));
    let writes = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let work = Duration::from_millis(args.work_ms);

    let mut tasks = Vec::with_capacity(args.readers + args.writers);
    for writer in 1..=args.writers {
        let book = book.clone();
        let writes = writes.clone();
        let overlaps = overlaps.clone();
        let rounds = args.rounds;
        tasks.push(spawn(format!("writer-{writer}"), move |_| {
            for round in 0..rounds {
                let value = (writer * 42 + round) as i64;
                book.write(|shared| {
                    if book.reader_count() > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    *shared = value;
                    thread::sleep(work);
                    info!(writer, value, "wrote");
                });
                writes.fetch_add(1, Ordering::SeqCst);
            }
        })?);
    }
    for reader in 1..=args.readers {
        let book = book.clone();
        let reads = reads.clone();
        let peak = peak.clone();
        let overlaps = overlaps.clone();
        let rounds = args.rounds;
        tasks.push(spawn(format!("reader-{reader}"), move |_| {
            for _ in 0..rounds {
                book.read(|shared| {
                    match book.state() {
                        GateState::Reading(n) => {
                            peak.fetch_max(n, Ordering::SeqCst);
                        }
                        _ => {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    info!(reader, value = *shared, "read");
                    thread::sleep(work);
                });
                reads.fetch_add(1, Ordering::SeqCst);
            }
        })?);
    }
    for task in tasks {
        task.join()?;
    }

    Ok(Outcome {
        reads: reads.load(Ordering::SeqCst),
        writes: writes.load(Ordering::SeqCst),
        peak_readers: peak.load(Ordering::SeqCst),
        overlaps: overlaps.load(Ordering::SeqCst),
        final_value: book.read(|v| *v),
        final_state: book.state(),
    })
}
