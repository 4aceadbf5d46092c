use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use teloxide::prelude::*;

use search_watchbot::config;
use search_watchbot::handlers::handle_webhook;
use search_watchbot::notify::TelegramNotifier;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Forward a webhook JSON payload as an alert notification"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// JSON payload; read from stdin when omitted
    #[arg(long)]
    payload: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let raw = match args.payload {
        Some(p) => p,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read payload from stdin")?;
            buf
        }
    };
    let payload: Value = serde_json::from_str(&raw).context("payload must be valid JSON")?;

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let notifier = TelegramNotifier::new(bot, ChatId(cfg.telegram.chat_id));
    let reply = handle_webhook(&notifier, &payload).await?;
    println!("{}", serde_json::to_string(&reply)?);
    Ok(())
}
