//! Cache statistics.
//!
//! Used by `grim stats` to show what is cached: entity counts per kind,
//! database size, and the most recent imports from `import_log`.

use anyhow::Result;
use sqlx::Row;

use grimoire_core::{EntityKind, EntityStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut by_kind = Vec::new();
    for kind in EntityKind::ALL {
        by_kind.push((kind, store.count(kind).await?));
    }
    let total: i64 = by_kind.iter().map(|(_, n)| n).sum();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Grimoire Cache Stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Entities:    {}", total);
    println!();
    println!("  {:<14} {:>8}", "KIND", "COUNT");
    println!("  {}", "-".repeat(23));
    for (kind, n) in &by_kind {
        println!("  {:<14} {:>8}", kind.as_str(), n);
    }

    let imports = sqlx::query(
        r#"
        SELECT kind, source_origin, imported, skipped, imported_at
        FROM import_log
        ORDER BY imported_at DESC, id DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !imports.is_empty() {
        println!();
        println!("  Recent imports:");
        println!(
            "  {:<14} {:<14} {:>8} {:>8}   {}",
            "KIND", "ORIGIN", "IMPORTED", "SKIPPED", "WHEN"
        );
        println!("  {}", "-".repeat(66));
        for row in &imports {
            let kind: String = row.get("kind");
            let origin: String = row.get("source_origin");
            let imported: i64 = row.get("imported");
            let skipped: i64 = row.get("skipped");
            let at: i64 = row.get("imported_at");
            println!(
                "  {:<14} {:<14} {:>8} {:>8}   {}",
                kind,
                origin,
                imported,
                skipped,
                format_ts_relative(at)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// `grim purge <kind>`: drop every cached entity of a kind.
pub async fn run_purge(config: &Config, kind: EntityKind) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let removed = store.purge(kind).await?;
    pool.close().await;

    println!("purge {}", kind);
    println!("  removed: {}", removed);
    println!("ok");
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
