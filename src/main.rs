use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use activity_sync::config;
use activity_sync::db;
use activity_sync::snapshot::SnapshotClient;
use activity_sync::SyncEngine;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync every user holding a token once and print the run summary
    Run,
    /// Sync a single user
    User {
        #[arg(long)]
        id: i64,
    },
    /// Print a user's sync status and cache summary
    Status {
        #[arg(long)]
        id: i64,
    },
    /// Run a scheduled sync every `sync.interval_seconds` until interrupted
    Daemon,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let client = SnapshotClient::from_config(&cfg)?;
    let engine = SyncEngine::new(pool, Arc::new(client), cfg.sync_options());

    match args.command {
        Command::Run => {
            let summary = engine.run_scheduled_sync().await?;
            print_json(&summary)?;
        }
        Command::User { id } => {
            let result = engine.run_user_sync(id).await?;
            print_json(&result)?;
        }
        Command::Status { id } => {
            let view = engine.sync_status(id).await?;
            print_json(&view)?;
        }
        Command::Daemon => {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(cfg.sync.interval_seconds));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                interval_seconds = cfg.sync.interval_seconds,
                "starting sync daemon"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match engine.run_scheduled_sync().await {
                            Ok(summary) => info!(
                                total = summary.total,
                                failed = summary.failed,
                                "scheduled run complete"
                            ),
                            Err(err) => error!(?err, "scheduled run failed"),
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutting down sync daemon");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
