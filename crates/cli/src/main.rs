// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sequent_cli::commands::{inspect, timers, verify};

#[derive(Parser)]
#[command(name = "sequent")]
#[command(about = "Offline inspection of sequent command and event logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of a command or event log.
    Inspect {
        log: PathBuf,

        /// Records to skip from the start of the log.
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Most records to show.
        #[arg(long, short, default_value_t = 100)]
        limit: usize,
    },
    /// Check every frame checksum of a log file.
    Verify {
        log: PathBuf,
    },
    /// Rebuild the timer registry from an event log and list pending timers.
    Timers {
        event_log: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { log, skip, limit } => inspect::run(&log, skip, limit, cli.json),
        Commands::Verify { log } => verify::run(&log, cli.json),
        Commands::Timers { event_log } => timers::run(&event_log, cli.json),
    }
}
