// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Opposite-direction transfers between two accounts.
//!
//! Half the tasks move money A→B, half B→A, one unit at a time. Each
//! transfer takes both account locks in identity order, so the run ends;
//! the global deadline turns a deadlock into a failed run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use semgate_sync::{spawn, transfer, Account, Bank, TransferError};
use tracing::{debug, info};

use super::within_budget;
use crate::error::CliError;
use crate::report::Report;

#[derive(Debug, Clone, Args)]
pub struct BankArgs {
    /// Starting balance of account A (B starts empty)
    #[arg(long, default_value_t = 1000)]
    pub initial: u64,

    /// Transfers in each direction
    #[arg(long, default_value_t = 1000)]
    pub transfers: usize,

    /// Tasks per direction sharing those transfers
    #[arg(long, default_value_t = 10)]
    pub tasks: usize,

    /// Units moved by each transfer
    #[arg(long, default_value_t = 1)]
    pub amount: u64,
}

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    refused: usize,
}

struct Outcome {
    balance_a: u64,
    balance_b: u64,
    total: u128,
    tally: Tally,
}

pub fn run(args: BankArgs, budget: Duration) -> Result<Report, CliError> {
    let started = Instant::now();
    let sizing = args.clone();
    let outcome = within_budget(budget, move || simulate(sizing))?;

    Ok(Report::new("bank", started.elapsed())
        .fact("balance_a", outcome.balance_a)
        .fact("balance_b", outcome.balance_b)
        .fact("completed", outcome.tally.completed)
        .fact("refused_insufficient_funds", outcome.tally.refused)
        .check(
            "money is conserved",
            outcome.total == u128::from(args.initial),
        )
        .check(
            "every transfer completed or was refused",
            outcome.tally.completed + outcome.tally.refused == args.transfers * 2,
        ))
}

fn simulate(args: BankArgs) -> Result<Outcome, CliError> {
    let bank = Bank::new();
    let a = bank.open(args.initial);
    let b = bank.open(0);
    info!(a = %a.id(), b = %b.id(), "accounts opened");

    let tasks_per_direction = args.tasks.max(1);
    let mut handles = Vec::with_capacity(tasks_per_direction * 2);
    for t in 0..tasks_per_direction {
        // Spread the transfers so the shares add up exactly.
        let share = args.transfers / tasks_per_direction
            + usize::from(t < args.transfers % tasks_per_direction);
        for (label, from, to) in [("a-to-b", &a, &b), ("b-to-a", &b, &a)] {
            let (from, to) = (Arc::clone(from), Arc::clone(to));
            let amount = args.amount;
            handles.push(spawn(format!("{label}-{t}"), move |_| {
                run_transfers(&from, &to, amount, share)
            })?);
        }
    }

    let mut tally = Tally::default();
    for handle in handles {
        let part = handle.join()??;
        tally.completed += part.completed;
        tally.refused += part.refused;
    }

    Ok(Outcome {
        balance_a: a.balance(),
        balance_b: b.balance(),
        total: bank.total(),
        tally,
    })
}

fn run_transfers(
    from: &Account,
    to: &Account,
    amount: u64,
    count: usize,
) -> Result<Tally, CliError> {
    let mut tally = Tally::default();
    for _ in 0..count {
        match transfer(from, to, amount) {
            Ok(_) => tally.completed += 1,
            Err(TransferError::InsufficientFunds { .. }) => {
                debug!(from = %from.id(), "transfer refused");
                tally.refused += 1;
            }
            Err(other) => return Err(CliError::Transfer(other)),
        }
    }
    Ok(tally)
}
