//! Knowledge-base statistics.
//!
//! `docent stats` prints how many chunks are stored, which embedding models
//! produced them, and when each model last wrote. Mixed models in one
//! knowledge base show up here first.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct ModelStats {
    model: String,
    dims: i64,
    doc_count: i64,
    last_update: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect_with_retry(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_documents")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Docent Knowledge Base Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Documents:   {}", total_docs);

    let rows = sqlx::query(
        r#"
        SELECT model, dims, COUNT(*) AS doc_count, MAX(updated_at) AS last_update
        FROM kb_documents
        GROUP BY model, dims
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let models: Vec<ModelStats> = rows
        .iter()
        .map(|row| ModelStats {
            model: row.get("model"),
            dims: row.get("dims"),
            doc_count: row.get("doc_count"),
            last_update: row.get("last_update"),
        })
        .collect();

    if !models.is_empty() {
        println!();
        println!("  By embedding model:");
        println!(
            "  {:<32} {:>6} {:>8}   {}",
            "MODEL", "DIMS", "DOCS", "LAST IMPORT"
        );
        println!("  {}", "-".repeat(70));
        for m in &models {
            println!(
                "  {:<32} {:>6} {:>8}   {}",
                m.model,
                m.dims,
                m.doc_count,
                format_ts_relative(m.last_update)
            );
        }
        if models.len() > 1 {
            println!();
            println!("  warning: more than one embedding model; similarity across them is meaningless");
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn recent_timestamps_are_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
    }
}
