// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! semgate CLI - runs the coordination demos on real threads and checks
//! the properties each primitive promises.

mod commands;
mod config;
mod error;
mod output;
mod report;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::{bank::BankArgs, buffer::BufferArgs, printers::PrintersArgs, readers::ReadersArgs};
use config::GlobalArgs;
use error::CliError;
use report::Report;

#[derive(Debug, Parser)]
#[command(name = "semgate", version, about = "Blocking coordination primitives, exercised")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Users share a fair pool of printers
    Printers(PrintersArgs),
    /// Producers and consumers through a bounded buffer
    Buffer(BufferArgs),
    /// Readers and writers on one shared book
    Readers(ReadersArgs),
    /// Concurrent transfers in both directions between two accounts
    Bank(BankArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    output::init();
    config::init_logging(cli.global.log.as_deref());

    match run(&cli) {
        Ok(report) if report.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            show_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Report, CliError> {
    let budget = cli.global.budget();
    let report = match &cli.command {
        Command::Printers(args) => commands::printers::run(args.clone(), budget)?,
        Command::Buffer(args) => commands::buffer::run(args.clone(), budget)?,
        Command::Readers(args) => commands::readers::run(args.clone(), budget)?,
        Command::Bank(args) => commands::bank::run(args.clone(), budget)?,
    };
    println!("{}", report.render(cli.global.format)?);
    Ok(report)
}

fn show_error(err: &CliError) {
    eprintln!("{}: {}", output::error_label(), err);
    if let Some(hint) = err.hint() {
        eprintln!("  {}: {}", output::hint_label(), hint);
    }
}
