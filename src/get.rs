//! `grim get`: point lookup of one entity.

use anyhow::{bail, Result};

use grimoire_core::{EntityKind, EntityStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_get(config: &Config, kind: EntityKind, identifier: &str, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let entity = store.get(kind, identifier).await?;
    pool.close().await;

    let Some(entity) = entity else {
        bail!("{} not found: {}", kind, identifier);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entity)?);
        return Ok(());
    }

    println!("--- {} ---", entity.kind);
    println!("identifier:      {}", entity.identifier);
    println!("name:            {}", entity.name);
    println!("source_origin:   {}", entity.source_origin);
    println!(
        "document:        {} ({})",
        entity.document.key.as_deref().unwrap_or("-"),
        entity.document.name.as_deref().unwrap_or("untitled")
    );
    println!("document_source: {}", entity.document.source);
    println!();

    println!("--- Attributes ---");
    for (name, value) in &entity.attributes {
        println!("{:<16} {}", format!("{}:", name), serde_json::to_string(value)?);
    }
    println!();

    println!("--- Payload ---");
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::Value::Object(entity.payload))?
    );

    Ok(())
}
