//! `grim documents`: list cached documents with per-kind counts.

use anyhow::Result;

use grimoire_core::discovery::list_documents;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

pub async fn run_documents(config: &Config, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let documents = list_documents(&store).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    if documents.is_empty() {
        println!("No documents cached.");
        return Ok(());
    }

    println!(
        "  {:<24} {:<14} {:>7}   {}",
        "DOCUMENT", "SOURCE", "ENTITIES", "KINDS"
    );
    println!("  {}", "-".repeat(76));
    for doc in &documents {
        let kinds = doc
            .entity_kind_counts
            .iter()
            .map(|(kind, n)| format!("{} {}", n, kind))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  {:<24} {:<14} {:>7}   {}",
            doc.document_key, doc.source, doc.entity_count, kinds
        );
        if let Some(name) = &doc.document_name {
            println!("    {}", name);
        }
        if let Some(publisher) = &doc.publisher {
            println!("    publisher: {}", publisher);
        }
    }
    Ok(())
}
