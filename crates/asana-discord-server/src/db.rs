use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

pub async fn init_sqlite(db_path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("connect sqlite at {}", db_path.display()))?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every connection to `:memory:`
/// would otherwise see its own empty database.
#[cfg(test)]
pub async fn init_sqlite_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("connect in-memory sqlite")?;
    migrate(&pool).await?;
    Ok(pool)
}

async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")
}

pub async fn get_channel_id(pool: &SqlitePool, action: &str) -> anyhow::Result<Option<String>> {
    let row = sqlx::query("SELECT channel_id FROM channel_map WHERE action = ?1")
        .bind(action)
        .fetch_optional(pool)
        .await
        .context("select channel mapping")?;
    Ok(row.map(|r| r.get::<String, _>("channel_id")))
}

pub async fn put_channel_id(pool: &SqlitePool, action: &str, channel_id: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO channel_map (action, channel_id, updated_at)
        VALUES (?1, ?2, unixepoch())
        ON CONFLICT(action) DO UPDATE SET
          channel_id = excluded.channel_id,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(action)
    .bind(channel_id)
    .execute(pool)
    .await
    .context("upsert channel mapping")?;
    Ok(())
}
