//! Host process for the plnts store and reconciliation scheduler.
//!
//! # Responsibility
//! - Load config, start logging and open the store.
//! - `reconcile`: run both jobs once and print their outcomes.
//! - `serve`: run the scheduler until stdin closes.

use clap::{Parser, Subcommand};
use log::error;
use plnts_core::model::brain::Job;
use plnts_core::{
    core_version, init_logging_from, open_store, CoreConfig, JobOutcome, Reconciler, Scheduler,
    SchedulerConfig, SystemClock,
};
use rusqlite::Connection;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "plnts")]
#[command(about = "Plant care store and reconciliation jobs")]
#[command(version)]
struct Cli {
    /// JSON config file; environment variables are used when absent
    #[arg(long, env = "PLNTS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run both reconciliation jobs once
    Reconcile,
    /// Run the scheduler until stdin closes
    Serve,
    /// Print the core library version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.command == Command::Version {
        println!("plnts_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path),
        None => CoreConfig::from_env(),
    }
    .map_err(|err| err.to_string())?;
    init_logging_from(&config.logging)?;

    let conn = open_store(&config.store.live_path, &config.store.history_path)
        .map_err(|err| err.to_string())?;

    match cli.command {
        Command::Reconcile => reconcile(&conn, config.scheduler),
        Command::Serve => serve(conn, config.scheduler, io::stdin().lock()),
        Command::Version => Ok(()),
    }
}

fn reconcile(conn: &Connection, config: SchedulerConfig) -> Result<(), String> {
    let clock = SystemClock;
    let reconciler = Reconciler::new(conn, &clock, config);
    let mut failed = false;
    for job in [Job::PlantAlertCheck, Job::PlantCareEventCheck] {
        let outcome = reconciler.run(job);
        failed |= matches!(outcome, JobOutcome::Failed { .. });
        println!("{} {}", job.name(), describe(&outcome));
    }
    if failed {
        return Err("one or more jobs failed".to_string());
    }
    Ok(())
}

/// Runs the scheduler until `input` reaches end of file.
///
/// The scheduler is stopped before a read error is reported.
fn serve(conn: Connection, config: SchedulerConfig, mut input: impl Read) -> Result<(), String> {
    let handle = Scheduler::register(conn, Arc::new(SystemClock), config)
        .map_err(|err| format!("failed to start scheduler: {err}"))?;
    println!("scheduler running; close stdin to stop");
    let waited = io::copy(&mut input, &mut io::sink());
    handle.shutdown();
    waited.map_err(|err| format!("failed to read stdin: {err}"))?;
    Ok(())
}

fn describe(outcome: &JobOutcome) -> String {
    match outcome {
        JobOutcome::Skipped { last_run } => format!("skipped last_run={last_run}"),
        JobOutcome::Completed { created, duration } => {
            format!("ok created={created} duration_ms={}", duration.as_millis())
        }
        JobOutcome::Failed { error, duration } => {
            format!("failed duration_ms={} error={error}", duration.as_millis())
        }
    }
}
