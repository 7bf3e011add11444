//! CLI for inspecting and maintaining the heartbeat schedule.
//!
//! Diagnostics go to stderr; command output goes to stdout.

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use heartbeat::config::LoggingConfig;
use heartbeat::scheduler::{
    HeartbeatRunner, HeartbeatScheduler, ScheduledTask, TaskExecutor, TaskResult, parse_definition,
};
use heartbeat::HeartbeatConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Heartbeat: declarative task schedule for the companion daemon.
#[derive(Parser)]
#[command(name = "heartbeat", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Schedule definition (overrides the config file).
    #[arg(long)]
    definition: Option<PathBuf>,

    /// Run-state file (overrides the config file).
    #[arg(long)]
    state: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Print task counts and schedule kinds as JSON.
    Summary,

    /// List tasks due at a given time (default: now).
    Due {
        /// Reference time, `YYYY-MM-DDTHH:MM[:SS]` local.
        #[arg(long, value_parser = parse_reference_time)]
        at: Option<NaiveDateTime>,
    },

    /// Mark a task completed now.
    Mark {
        /// Task name.
        name: String,
    },

    /// Report definition lines that would be skipped; fails if any are.
    Check,

    /// Delete the run-state file so every task counts as never run.
    Reset,

    /// Run the tick loop until Ctrl-C, logging each due task.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HeartbeatConfig::from_file(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => HeartbeatConfig::load_or_default()?,
    };
    if cli.definition.is_some() {
        config.definition_path = cli.definition.clone();
    }
    if cli.state.is_some() {
        config.state_path = cli.state.clone();
    }

    let _guard = init_tracing(&config.logging);

    let mut scheduler = HeartbeatScheduler::from_paths(config.definition_path(), config.state_path());

    match cli.command.unwrap_or(Command::Summary) {
        Command::Summary => {
            scheduler.load();
            println!("{}", serde_json::to_string_pretty(&scheduler.summary())?);
        }
        Command::Due { at } => {
            scheduler.load();
            print_due(&scheduler, at.unwrap_or_else(|| Local::now().naive_local()));
        }
        Command::Mark { name } => {
            scheduler.load();
            if scheduler.task(&name).is_none() {
                eprintln!("warning: '{name}' is not in the current definition");
            }
            scheduler.mark_completed(&name);
            println!("marked {name} completed");
        }
        Command::Check => {
            let path = config.definition_path();
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let parsed = parse_definition(&text);
            for skipped in &parsed.skipped {
                println!("line {}: {} ({})", skipped.line_number, skipped.reason, skipped.text);
            }
            if !parsed.skipped.is_empty() {
                anyhow::bail!(
                    "{} task line(s) skipped in {}",
                    parsed.skipped.len(),
                    path.display()
                );
            }
            println!("{} tasks, no skipped lines", parsed.tasks.len());
        }
        Command::Reset => {
            scheduler.store().clear()?;
            println!("run state cleared");
        }
        Command::Run => {
            let executor: TaskExecutor = Arc::new(|task: &ScheduledTask| {
                info!(task = %task.name, schedule = %task.schedule, "{}", task.description);
                TaskResult::Success(task.description.clone())
            });
            let cancel = CancellationToken::new();
            let handle = HeartbeatRunner::new(scheduler, executor)
                .with_tick_interval(config.tick_interval())
                .run(cancel.clone());

            tokio::signal::ctrl_c()
                .await
                .context("cannot listen for Ctrl-C")?;
            info!("shutting down heartbeat runner");
            cancel.cancel();
            handle.await?;
        }
    }

    Ok(())
}

/// Initialize tracing to stderr, plus a daily log file when configured.
fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "heartbeat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

fn print_due(scheduler: &HeartbeatScheduler, now: NaiveDateTime) {
    let (mut parallel, mut serial) = HeartbeatScheduler::partition_parallel(scheduler.due_tasks(now));
    let mut sequential = scheduler.sequential_tasks();
    for group in [&mut parallel, &mut serial, &mut sequential] {
        group.sort_by(|a, b| a.name.cmp(&b.name));
    }

    println!("due at {}", now.format("%Y-%m-%d %H:%M:%S"));
    print_group("parallel-safe", &parallel);
    print_group("one at a time", &serial);
    print_group("sequential (every tick)", &sequential);
}

fn print_group(title: &str, tasks: &[ScheduledTask]) {
    println!("\n{title}:");
    if tasks.is_empty() {
        println!("  (none)");
    }
    for task in tasks {
        println!("  {:<24} {:<28} {}", task.name, task.schedule.to_string(), task.description);
    }
}

fn parse_reference_time(raw: &str) -> Result<NaiveDateTime, String> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM[:SS], got '{raw}'"))
}
