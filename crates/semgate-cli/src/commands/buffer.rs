// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Producers and consumers through a bounded buffer.
//!
//! Each consumer stops at a `None` sentinel; one is put per consumer after
//! every producer has finished.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use semgate_sync::{spawn, BoundedChannel};
use tracing::info;

use super::within_budget;
use crate::error::CliError;
use crate::report::Report;

#[derive(Debug, Clone, Args)]
pub struct BufferArgs {
    /// Slots in the buffer
    #[arg(long, default_value_t = 5)]
    pub capacity: usize,

    #[arg(long, default_value_t = 2)]
    pub producers: usize,

    #[arg(long, default_value_t = 2)]
    pub consumers: usize,

    /// Items each producer puts
    #[arg(long, default_value_t = 15)]
    pub items: usize,

    /// Pause after each take, in milliseconds; slow consumers make the
    /// producers hit backpressure
    #[arg(long, default_value_t = 2)]
    pub work_ms: u64,
}

#[derive(Debug, Default)]
struct Outcome {
    consumed: usize,
    checksum: u64,
    in_order: bool,
    peak_len: usize,
}

/// Items are `(producer, sequence)`; `None` tells a consumer to stop.
type Item = Option<(usize, usize)>;

pub fn run(args: BufferArgs, budget: Duration) -> Result<Report, CliError> {
    let started = Instant::now();
    let sizing = args.clone();
    let outcome = within_budget(budget, move || simulate(sizing))?;

    let produced = args.producers * args.items;
    let expected_checksum = expected_checksum(args.producers, args.items);
    Ok(Report::new("buffer", started.elapsed())
        .fact("capacity", args.capacity)
        .fact("produced", produced)
        .fact("consumed", outcome.consumed)
        .fact("peak_buffered", outcome.peak_len)
        .check("every item consumed exactly once", {
            outcome.consumed == produced && outcome.checksum == expected_checksum
        })
        .check("each producer's items arrived in order", outcome.in_order)
        .check(
            format!("never more than {} items buffered", args.capacity),
            outcome.peak_len <= args.capacity,
        ))
}

fn simulate(args: BufferArgs) -> Result<Outcome, CliError> {
    let channel: Arc<BoundedChannel<Item>> = Arc::new(BoundedChannel::new(args.capacity)?);
    let peak = Arc::new(AtomicUsize::new(0));
    let work = Duration::from_millis(args.work_ms);

    let mut producers = Vec::with_capacity(args.producers);
    for p in 0..args.producers {
        let channel = channel.clone();
        let peak = peak.clone();
        let items = args.items;
        producers.push(spawn(format!("producer-{p}"), move |_| {
            for seq in 0..items {
                channel.put(Some((p, seq)));
                peak.fetch_max(channel.len(), Ordering::SeqCst);
                info!(producer = p, item = seq, "produced");
            }
        })?);
    }

    let mut consumers = Vec::with_capacity(args.consumers);
    for c in 0..args.consumers {
        let channel = channel.clone();
        let producers = args.producers;
        consumers.push(spawn(format!("consumer-{c}"), move |_| {
            let mut seen = Outcome {
                in_order: true,
                ..Outcome::default()
            };
            let mut next = vec![0usize; producers];
            while let Some((p, seq)) = channel.take() {
                info!(consumer = c, producer = p, item = seq, "consumed");
                seen.in_order &= seq >= next[p];
                next[p] = seq + 1;
                seen.consumed += 1;
                seen.checksum += item_weight(p, seq);
                thread::sleep(work);
            }
            seen
        })?);
    }

    for producer in producers {
        producer.join()?;
    }
    for _ in 0..args.consumers {
        channel.put(None);
    }

    let mut total = Outcome {
        in_order: true,
        peak_len: peak.load(Ordering::SeqCst),
        ..Outcome::default()
    };
    for consumer in consumers {
        let seen = consumer.join()?;
        total.consumed += seen.consumed;
        total.checksum += seen.checksum;
        total.in_order &= seen.in_order;
    }
    Ok(total)
}

/// Distinct weight per item so a lost or duplicated item shows in the sum.
fn item_weight(producer: usize, seq: usize) -> u64 {
    (producer as u64 + 1) * 1_000_003 + seq as u64
}

fn expected_checksum(producers: usize, items: usize) -> u64 {
    (0..producers)
        .flat_map(|p| (0..items).map(move |s| item_weight(p, s)))
        .sum()
}
