use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};

use search_watchbot::config;
use search_watchbot::db;
use search_watchbot::model::WorkUnit;
use search_watchbot::notify::TelegramNotifier;
use search_watchbot::store::SqliteStore;
use search_watchbot::Worker;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Run configured search work units once and exit (for cron-style scheduling)"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Only run the named work unit(s); defaults to all
    #[arg(long = "unit")]
    units: Vec<String>,
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

    let units: Vec<WorkUnit> = if args.units.is_empty() {
        cfg.work_units.clone()
    } else {
        args.units
            .iter()
            .map(|name| {
                cfg.work_unit(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("unknown work unit '{}'", name))
            })
            .collect::<Result<_>>()?
    };
    if units.is_empty() {
        info!("No work units configured, exiting");
        return Ok(());
    }

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot, ChatId(cfg.telegram.chat_id)));
    let worker = Worker::from_config(&cfg, store, notifier)?;

    info!(count = units.len(), "Starting search runs");
    let results = worker.run_all(&units).await;

    let mut failed = 0;
    for (unit, result) in units.iter().zip(&results) {
        match result.completion() {
            Ok(payload) => info!(
                work_unit = %unit.name,
                items = result.total,
                cursor_advanced = result.cursor_advanced,
                %payload,
                "Run finished"
            ),
            Err(err) => {
                failed += 1;
                error!(
                    work_unit = %unit.name,
                    succeeded = result.succeeded,
                    total = result.total,
                    %err,
                    "Run failed"
                );
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} work units failed", failed, units.len()));
    }
    info!("All search runs completed successfully");
    Ok(())
}
