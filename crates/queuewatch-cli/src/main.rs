//! queuewatch - alerts when a task-tracker section fills up

mod backend;
mod control;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use queuewatch_core::logging::{self, RotationPolicy};
use queuewatch_core::{AppPaths, StateStore, WatchConfig, Watcher};
use queuewatch_scheduler::{Scheduler, SchedulerState, TriggerOutcome};

use backend::LiveBackend;
use control::ControlCommand;

#[derive(Parser, Debug)]
#[command(name = "queuewatch", version, about)]
struct Cli {
    /// Directory holding config.toml, state.json and the log file.
    /// Defaults to $QUEUEWATCH_HOME, then the per-user app directory.
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Poll on the configured interval until stopped (default)
    Run,
    /// Run a single check and exit
    Check,
    /// Send a test notification through the configured channels
    TestNotify,
    /// Write a default config file if none exists
    Init,
    /// Print the files queuewatch reads and writes
    Paths,
}

impl Command {
    fn logs_to_file(self) -> bool {
        matches!(self, Command::Run | Command::Check | Command::TestNotify)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);
    let paths = AppPaths::resolve(cli.base_dir.as_deref())?;

    let log_file = command.logs_to_file().then_some(paths.log.as_path());
    logging::init(log_file, RotationPolicy::default())?;

    match command {
        Command::Run => run(paths).await,
        Command::Check => check_once(paths).await,
        Command::TestNotify => test_notify(paths).await,
        Command::Init => init(&paths),
        Command::Paths => {
            print_paths(&paths);
            Ok(())
        }
    }
}

fn watcher_for(paths: &AppPaths) -> Arc<Watcher> {
    let backend = Arc::new(LiveBackend::new(paths.clone()));
    Arc::new(Watcher::new(paths.clone(), backend))
}

async fn run(paths: AppPaths) -> Result<()> {
    let config = WatchConfig::load(&paths.config).context("Failed to load config")?;
    config.log_warnings();
    info!(
        "Watching section '{}' every {} min (threshold {}, cooldown {} min)",
        config.section_name,
        config.polling_minutes,
        config.threshold(),
        config.cooldown_minutes
    );

    let watcher = watcher_for(&paths);
    let scheduler = Scheduler::start(watcher.clone(), config.polling_interval());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match control::parse(&line) {
                    Ok(Some(ControlCommand::Quit)) => break,
                    Ok(Some(cmd)) => handle_command(cmd, &scheduler, &watcher).await,
                    Ok(None) => {}
                    Err(msg) => eprintln!("{}", msg),
                },
                Ok(None) => {
                    // Detached from a terminal; keep polling until signalled
                    info!("stdin closed, control commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    info!("Stopping scheduler");
    scheduler.shutdown().await;
    info!("=== queuewatch stopped ===");
    Ok(())
}

async fn handle_command(cmd: ControlCommand, scheduler: &Scheduler, watcher: &Watcher) {
    match cmd {
        ControlCommand::CheckNow => match scheduler.check_now() {
            TriggerOutcome::Accepted => println!("check requested"),
            TriggerOutcome::Dropped => println!("check already in progress, request dropped"),
        },
        ControlCommand::SetInterval(minutes) => {
            scheduler.set_interval(Duration::from_secs(u64::from(minutes) * 60));
            info!("Polling interval set to {} min", minutes);
            println!("polling every {} min", minutes);
        }
        ControlCommand::Reload => match WatchConfig::load(&watcher.paths().config) {
            Ok(config) => {
                config.log_warnings();
                scheduler.set_interval(config.polling_interval());
                info!("Config reloaded, polling every {} min", config.polling_minutes);
                println!("config reloaded");
            }
            Err(e) => {
                error!("Config reload failed: {}", e);
                eprintln!("reload failed: {}", e);
            }
        },
        ControlCommand::TestNotify => match watcher.notify_test().await {
            Ok(()) => println!("test notification sent"),
            Err(e) => eprintln!("test notification failed: {}", e),
        },
        ControlCommand::Status => {
            let state = StateStore::new(&watcher.paths().state).load_or_default();
            let activity = match scheduler.state() {
                SchedulerState::Idle => "idle",
                SchedulerState::Running => "checking",
            };
            let last_notified = state
                .last_notified_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "{}, every {} min; last count {}, below threshold: {}, last notified: {}",
                activity,
                scheduler.interval().as_secs() / 60,
                state.last_count,
                state.was_below_threshold,
                last_notified
            );
        }
        ControlCommand::Help => println!("{}", control::HELP),
        ControlCommand::Quit => {}
    }
}

async fn check_once(paths: AppPaths) -> Result<()> {
    let watcher = watcher_for(&paths);
    match watcher.check().await {
        Ok(report) => {
            println!("{} open tasks (threshold {})", report.count, report.threshold);
            if report.notified {
                match report.notify_error {
                    Some(e) => println!("notification failed: {}", e),
                    None => println!("notification sent"),
                }
            }
            Ok(())
        }
        Err(e) if e.is_skip() => {
            println!("check skipped: {}", e);
            Ok(())
        }
        Err(e) => Err(e).context("Check failed"),
    }
}

async fn test_notify(paths: AppPaths) -> Result<()> {
    let watcher = watcher_for(&paths);
    watcher
        .notify_test()
        .await
        .context("Test notification failed")?;
    println!("test notification sent");
    Ok(())
}

fn init(paths: &AppPaths) -> Result<()> {
    let existed = paths.config.exists();
    let config = WatchConfig::load(&paths.config).context("Failed to initialise config")?;
    if existed {
        println!("config already exists: {}", paths.config.display());
    } else {
        println!("wrote default config: {}", paths.config.display());
    }
    for warning in config.validate() {
        println!("  note: {}", warning);
    }
    Ok(())
}

fn print_paths(paths: &AppPaths) {
    println!("base:   {}", paths.base_dir.display());
    println!("config: {}", paths.config.display());
    println!("state:  {}", paths.state.display());
    println!("log:    {}", paths.log.display());
    println!("bin:    {}", paths.bin_dir().display());
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
