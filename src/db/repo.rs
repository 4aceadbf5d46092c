use super::model::RecordRow;
use crate::model::RemoteItem;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    // WAL and stricter durability on every pooled connection.
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {}", normalized))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePool::connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    Ok(pool)
}

/// Single-connection in-memory pool with migrations applied. Every
/// `sqlite::memory:` connection is its own database, so the pool is capped at one.
pub async fn memory_pool() -> Result<Pool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the parent
/// directory exists. In-memory and non-sqlite URLs pass through unchanged.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path_part.to_string(),
    };

    if let Some(parent) = Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query_part {
        Some(q) => format!("sqlite://{}?{}", expanded, q),
        None => format!("sqlite://{}", expanded),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_cursor(pool: &Pool, work_unit: &str) -> Result<Option<String>> {
    let id = sqlx::query_scalar::<_, String>(
        "SELECT high_water_id FROM cursors WHERE work_unit = ?",
    )
    .bind(work_unit)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn upsert_cursor(pool: &Pool, work_unit: &str, high_water_id: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO cursors (work_unit, high_water_id, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(work_unit) DO UPDATE SET high_water_id = excluded.high_water_id, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(work_unit)
    .bind(high_water_id)
    .execute(pool)
    .await
    .context("failed to persist cursor")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_record(
    pool: &Pool,
    id: &str,
    timestamp: DateTime<Utc>,
    item: &RemoteItem,
    visible: bool,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO records (id, remote_id, author, author_name, text, raw_created_at, timestamp, visible, stored_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&item.id)
    .bind(&item.author)
    .bind(item.author_name.as_deref())
    .bind(&item.text)
    .bind(&item.created_at)
    .bind(timestamp)
    .bind(visible)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to insert record")?;
    Ok(())
}

/// Returns `false` when no record has the given id.
#[instrument(skip_all)]
pub async fn set_record_visible(pool: &Pool, id: &str, visible: bool) -> Result<bool> {
    let res = sqlx::query("UPDATE records SET visible = ? WHERE id = ?")
        .bind(visible)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to update record visibility")?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn list_records(pool: &Pool) -> Result<Vec<RecordRow>> {
    let rows = sqlx::query(
        "SELECT id, remote_id, author, author_name, text, raw_created_at, timestamp, visible, stored_at \
         FROM records ORDER BY stored_at ASC, rowid ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &SqliteRow) -> Result<RecordRow> {
    Ok(RecordRow {
        id: row.try_get("id")?,
        remote_id: row.try_get("remote_id")?,
        author: row.try_get("author")?,
        author_name: row.try_get::<Option<String>, _>("author_name")?,
        text: row.try_get("text")?,
        raw_created_at: row.try_get("raw_created_at")?,
        timestamp: row.try_get("timestamp")?,
        visible: row.try_get("visible")?,
        stored_at: row.try_get("stored_at")?,
    })
}
