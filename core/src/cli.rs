use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::frame::{Frame, Globals};
use crate::scheduler::Scheduler;
use crate::stmt::{ProfileCollector, Stmt, TagFilter};
use crate::types::Val;

#[derive(Parser)]
#[command(name = "netpolicy")]
#[command(about = "netpolicy - inspect and run checkpointed policy statements", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides NETPOLICY_CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a checkpointed statement tree as policy source
    Describe {
        /// Checkpoint file
        file: PathBuf,
    },

    /// Decode and re-encode a checkpoint, failing if it does not round-trip
    Check {
        /// Checkpoint file
        file: PathBuf,
    },

    /// Execute a checkpointed body and wait for its pending `when` statements
    Run {
        /// Checkpoint file
        file: PathBuf,

        /// Global binding as NAME=VALUE, VALUE in checkpoint JSON (e.g. '{"t":"Count","v":1}')
        #[arg(short = 'g', long = "global", value_parser = parse_binding)]
        globals: Vec<(String, Val)>,

        /// Write the tree back with its updated access statistics
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print per-statement execution counts afterwards
        #[arg(long)]
        stats: bool,
    },

    /// Print the access statistics stored in a checkpoint
    Stats {
        /// Checkpoint file
        file: PathBuf,

        /// Include statements that never executed
        #[arg(long)]
        all: bool,
    },
}

fn parse_binding(raw: &str) -> Result<(String, Val), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value: Val = serde_json::from_str(value).map_err(|e| format!("bad value for {}: {}", name, e))?;
    Ok((name.to_string(), value))
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with pre-parsed arguments
pub async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration eagerly so errors show before any output
    let config = Config::builder().config_path(cli.config.clone()).build()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    match cli.command {
        Commands::Describe { file } => {
            let root = load(&file)?;
            println!("{}", root);
        }

        Commands::Check { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let root = Stmt::decode(&bytes, TagFilter::Any)
                .with_context(|| format!("Failed to decode {}", file.display()))?;
            let first = root.encode()?;
            let again = Stmt::decode(&first, TagFilter::Any)?.encode()?;
            anyhow::ensure!(first == again, "checkpoint does not round-trip");
            println!("{}: ok ({} root)", file.display(), root.tag());
        }

        Commands::Run {
            file,
            globals,
            save,
            stats,
        } => {
            let root = load(&file)?;
            let globals = Globals::with_vars(globals.into_iter().collect()).shared();
            let mut scheduler = Scheduler::new(config.scheduler());

            let result = scheduler.run_body(&root, Frame::new(globals.clone()));
            flush(&mut scheduler);
            match result.context("Execution failed")? {
                Some(value) => println!("=> {}", value),
                None => info!("body completed without a value"),
            }

            if scheduler.pending() > 0 {
                info!(pending = scheduler.pending(), "waiting for when statements");
                let clock = || {
                    let now = Utc::now();
                    globals.borrow_mut().set_network_time(now);
                    now
                };
                let report = scheduler.drive(clock, config.max_wait()).await;
                flush(&mut scheduler);
                for (id, value) in scheduler.drain_results() {
                    match value {
                        Some(value) => println!("=> {} = {}", id, value),
                        None => info!(%id, "when completed without a value"),
                    }
                }
                for (id, err) in &report.failed {
                    warn!(%id, error = %err, "when statement failed");
                }
                if scheduler.pending() > 0 {
                    warn!(pending = scheduler.pending(), "gave up waiting");
                }
            }

            if stats {
                print_stats(&root, false);
            }
            if let Some(path) = save {
                let bytes = if config.pretty_checkpoints {
                    root.encode_pretty()?
                } else {
                    root.encode()?
                };
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        Commands::Stats { file, all } => {
            let root = load(&file)?;
            print_stats(&root, !all);
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Stmt> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Stmt::decode(&bytes, TagFilter::Any)
        .with_context(|| format!("Failed to decode {}", path.display()))
}

fn flush(scheduler: &mut Scheduler) {
    for line in scheduler.take_printed() {
        println!("{}", line);
    }
    for event in scheduler.drain_events() {
        let args: Vec<String> = event.args.iter().map(ToString::to_string).collect();
        println!("event {}({})", event.name, args.join(", "));
    }
    for span in scheduler.take_breakpoint_hits() {
        println!("breakpoint at {}", span);
    }
}

fn print_stats(root: &Stmt, executed_only: bool) {
    for row in ProfileCollector::collect(root, executed_only) {
        let last = row
            .last_access
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<16} {:<14} {:>8}  {}", row.span.to_string(), row.tag, row.access_count, last);
    }
}
