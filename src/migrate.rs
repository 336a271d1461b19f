//! Schema creation.
//!
//! One table per entity kind, generated from the kind's alias table:
//!
//! | Column | Type | Notes |
//! |--------|------|-------|
//! | `identifier` | TEXT | primary key |
//! | `name` | TEXT | as normalized |
//! | `name_lower` | TEXT | Unicode-lowercased `name`, indexed |
//! | `source_origin` | TEXT | |
//! | `document_key` | TEXT | indexed |
//! | `document_name` | TEXT | |
//! | `document_source` | TEXT NOT NULL | |
//! | `payload_json` | TEXT | display payload |
//! | `<attribute>` | per type | one indexed column per indexed attribute |
//!
//! Plus the `document_metadata` enrichment table and the `import_log`.
//! Every statement is idempotent; attribute columns added to an alias table
//! after a database was created are appended with `ALTER TABLE`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use grimoire_core::schema::alias_table;
use grimoire_core::store::ColumnType;
use grimoire_core::EntityKind;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::NAME_LOWER_COLUMN;

/// Name of the table holding `kind`.
pub fn entity_table(kind: EntityKind) -> String {
    format!("entities_{}", kind.as_str())
}

pub fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer | ColumnType::Boolean => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Text | ColumnType::List => "TEXT",
    }
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    for kind in EntityKind::ALL {
        create_entity_table(pool, kind).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_metadata (
            document_key TEXT NOT NULL,
            document_source TEXT NOT NULL,
            publisher TEXT,
            license TEXT,
            game_system TEXT,
            PRIMARY KEY (document_key, document_source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            source_origin TEXT NOT NULL,
            path TEXT,
            imported INTEGER NOT NULL,
            skipped INTEGER NOT NULL,
            imported_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_entity_table(pool: &SqlitePool, kind: EntityKind) -> Result<()> {
    let table = entity_table(kind);
    let spec = alias_table(kind);

    let mut columns = vec![
        "identifier TEXT PRIMARY KEY".to_string(),
        "name TEXT NOT NULL".to_string(),
        "name_lower TEXT NOT NULL DEFAULT ''".to_string(),
        "source_origin TEXT NOT NULL".to_string(),
        "document_key TEXT".to_string(),
        "document_name TEXT".to_string(),
        "document_source TEXT NOT NULL".to_string(),
        "payload_json TEXT NOT NULL DEFAULT '{}'".to_string(),
    ];
    for attr in spec.attributes {
        columns.push(format!("{} {}", attr.name, sql_type(attr.ty.into())));
    }

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table,
        columns.join(",\n    ")
    ))
    .execute(pool)
    .await?;

    let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();
    if !existing.iter().any(|c| c == NAME_LOWER_COLUMN) {
        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
            table, NAME_LOWER_COLUMN
        ))
        .execute(pool)
        .await?;
        backfill_name_lower(pool, &table).await?;
    }
    for attr in spec.attributes {
        if !existing.iter().any(|c| c == attr.name) {
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table,
                attr.name,
                sql_type(attr.ty.into())
            ))
            .execute(pool)
            .await?;
        }
    }

    sqlx::query(&format!("DROP INDEX IF EXISTS idx_{table}_name_lower"))
        .execute(pool)
        .await?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_name_folded ON {table} ({NAME_LOWER_COLUMN})"
    ))
    .execute(pool)
    .await?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_document_key ON {table} (document_key)"
    ))
    .execute(pool)
    .await?;
    for attr in spec.attributes {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table} ({col})",
            col = attr.name
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Fill `name_lower` for rows written before the column existed.
async fn backfill_name_lower(pool: &SqlitePool, table: &str) -> Result<()> {
    let rows = sqlx::query(&format!("SELECT identifier, name FROM {}", table))
        .fetch_all(pool)
        .await?;
    let mut tx = pool.begin().await?;
    for row in &rows {
        let identifier: String = row.get("identifier");
        let name: String = row.get("name");
        sqlx::query(&format!(
            "UPDATE {} SET {} = ? WHERE identifier = ?",
            table, NAME_LOWER_COLUMN
        ))
        .bind(name.to_lowercase())
        .bind(identifier)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}
