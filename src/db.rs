use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run `op` up to `attempts` times, sleeping `backoff` between failures.
///
/// Returns the last error once attempts are exhausted.
pub async fn with_retry<T, F, Fut>(attempts: u32, backoff: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "knowledge base not ready, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("knowledge base unavailable after {} attempts", attempts)
                })
            }
        }
    }
}

/// Open the database and check the schema, retrying per `[db]` settings.
pub async fn connect_with_retry(config: &Config) -> Result<SqlitePool> {
    let backoff = Duration::from_secs(config.db.connect_backoff_secs);
    with_retry(config.db.connect_attempts, backoff, move || async move {
        let pool = connect(config).await?;
        crate::migrate::check_schema(&pool).await?;
        Ok(pool)
    })
    .await
}
