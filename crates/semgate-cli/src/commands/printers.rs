// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Users share a small pool of printers, served in arrival order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use semgate_sync::{spawn, ResourcePool};
use tracing::info;

use super::within_budget;
use crate::error::CliError;
use crate::report::Report;

#[derive(Debug, Clone, Args)]
pub struct PrintersArgs {
    /// Printers in the pool
    #[arg(long, default_value_t = 2)]
    pub printers: usize,

    /// Users, each printing one document
    #[arg(long, default_value_t = 10)]
    pub users: usize,

    /// Time one document takes to print, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub work_ms: u64,
}

struct Outcome {
    served: Vec<usize>,
    peak: usize,
    available_after: usize,
}

pub fn run(args: PrintersArgs, budget: Duration) -> Result<Report, CliError> {
    let started = Instant::now();
    let sizing = args.clone();
    let outcome = within_budget(budget, move || simulate(sizing))?;

    Ok(Report::new("printers", started.elapsed())
        .fact("printers", args.printers)
        .fact("users", args.users)
        .fact("peak_printing", outcome.peak)
        .fact("served_order", outcome.served.clone())
        .check(
            format!("at most {} documents printing at once", args.printers),
            outcome.peak <= args.printers,
        )
        .check("every user printed", outcome.served.len() == args.users)
        .check(
            "all printers back in the pool",
            outcome.available_after == args.printers,
        ))
}

fn simulate(args: PrintersArgs) -> Result<Outcome, CliError> {
    let pool = Arc::new(ResourcePool::new(args.printers)?);
    let printing = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(Mutex::new(Vec::with_capacity(args.users)));
    let work = Duration::from_millis(args.work_ms);

    let mut users = Vec::with_capacity(args.users);
    for user in 1..=args.users {
        let pool = pool.clone();
        let printing = printing.clone();
        let peak = peak.clone();
        let served = served.clone();
        users.push(spawn(format!("user-{user}"), move |_| {
            let document = format!("Document-{user}");
            pool.with_resource(|| {
                let now = printing.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                served
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(user);
                info!(user, %document, "printing");
                thread::sleep(work);
                info!(user, "finished printing");
                printing.fetch_sub(1, Ordering::SeqCst);
            })
        })?);
    }
    for user in users {
        user.join()?;
    }

    let served = served
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    Ok(Outcome {
        served,
        peak: peak.load(Ordering::SeqCst),
        available_after: pool.available(),
    })
}
