use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use search_watchbot::config;
use search_watchbot::db;
use search_watchbot::handlers::handle_feed;
use search_watchbot::store::SqliteStore;

#[derive(Debug, Parser)]
#[command(author, version, about = "Dump every stored record as feed JSON")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Write to this file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Only include records currently marked visible
    #[arg(long)]
    visible_only: bool,
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

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);

    let mut page = handle_feed(&store).await?;
    if args.visible_only {
        page.data.retain(|r| r.visible);
    }
    let json = serde_json::to_string_pretty(&page)?;

    match &args.out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
