use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use search_watchbot::bot::{self, BotState};
use search_watchbot::config;
use search_watchbot::db;
use search_watchbot::handlers::StatusProbe;
use search_watchbot::notify::TelegramNotifier;
use search_watchbot::store::SqliteStore;
use search_watchbot::Worker;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Report `error` from the status probe
    #[arg(long)]
    report_error: bool,
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
    let store = Arc::new(SqliteStore::new(pool));

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(
        bot.clone(),
        ChatId(cfg.telegram.chat_id),
    ));
    let worker = Arc::new(Worker::from_config(&cfg, store.clone(), notifier)?);

    // Scheduled runs over every configured work unit.
    let units = cfg.work_units.clone();
    let interval = cfg.poll_interval();
    tokio::spawn(async move {
        loop {
            let results = worker.run_all(&units).await;
            for (unit, result) in units.iter().zip(&results) {
                match result.completion() {
                    Ok(_) => info!(
                        work_unit = %unit.name,
                        items = result.total,
                        cursor_advanced = result.cursor_advanced,
                        "run completed"
                    ),
                    Err(err) => warn!(
                        work_unit = %unit.name,
                        succeeded = result.succeeded,
                        total = result.total,
                        %err,
                        "run failed"
                    ),
                }
            }
            tokio::time::sleep(interval).await;
        }
    });

    if cfg.work_units.is_empty() {
        error!("no work units configured; only the bot will run");
    }

    let state = BotState {
        records: store,
        status: StatusProbe::new(!args.report_error),
        allowed_users: cfg.telegram.allowed_users.clone(),
    };
    bot::run_dispatcher(bot, state).await;

    Ok(())
}
