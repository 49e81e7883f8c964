use anyhow::{bail, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Knowledge base: one row per embedded chunk
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_documents (
            id TEXT PRIMARY KEY,
            page_content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_kb_documents_model ON kb_documents(model)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}

/// Fail unless the knowledge-base table exists.
pub async fn check_schema(pool: &SqlitePool) -> Result<()> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='kb_documents'",
    )
    .fetch_one(pool)
    .await?;

    if !exists {
        bail!("kb_documents table missing; run `docent init` first");
    }
    Ok(())
}
