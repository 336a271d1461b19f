//! `grim search`: filtered lookup over one entity kind.
//!
//! Command-line flags are folded into the same flat parameter map the
//! query engine accepts from tool callers, so both surfaces share
//! [`SearchRequest::from_params`] validation.

use anyhow::{bail, Result};
use serde_json::Value;

use grimoire_core::query::{search, SearchRequest};
use grimoire_core::{AttrValue, Entity, EntityKind};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Parse a `key=value` filter. The value is read as JSON when it parses
/// (numbers, booleans, arrays, `{"op": ..}` objects), else as a string.
pub fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("filter must be key=value, got '{}'", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("filter must be key=value, got '{}'", raw);
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn build_request(
    kind: EntityKind,
    name: Option<String>,
    documents: Vec<String>,
    filters: &[String],
    limit: Option<i64>,
) -> Result<SearchRequest> {
    let mut params = serde_json::Map::new();
    for raw in filters {
        let (key, value) = parse_filter(raw)?;
        params.insert(key, value);
    }
    if let Some(name) = name {
        params.insert("name".into(), Value::String(name));
    }
    if !documents.is_empty() {
        params.insert(
            "document_keys".into(),
            Value::Array(documents.into_iter().map(Value::String).collect()),
        );
    }
    if let Some(limit) = limit {
        params.insert("limit".into(), Value::from(limit));
    }
    Ok(SearchRequest::from_params(kind, &params)?)
}

fn render_attr(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Absent => None,
        AttrValue::Int(i) => Some(i.to_string()),
        AttrValue::Float(f) => Some(f.to_string()),
        AttrValue::Bool(b) => Some(b.to_string()),
        AttrValue::Text(s) => Some(s.clone()),
        AttrValue::List(items) => Some(items.join(", ")),
    }
}

pub fn print_entity_line(i: usize, entity: &Entity) {
    println!("{}. {} [{}]", i + 1, entity.name, entity.identifier);
    println!(
        "    document: {} / {}",
        entity.document.key.as_deref().unwrap_or("-"),
        entity.document.source
    );
    let attrs: Vec<String> = entity
        .attributes
        .iter()
        .filter_map(|(k, v)| render_attr(v).map(|v| format!("{}: {}", k, v)))
        .collect();
    if !attrs.is_empty() {
        println!("    {}", attrs.join(", "));
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run_search(
    config: &Config,
    kind: EntityKind,
    name: Option<String>,
    documents: Vec<String>,
    filters: &[String],
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let request = build_request(kind, name, documents, filters, limit)?;
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let results = search(&store, &request, &config.search.limits()).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, entity) in results.iter().enumerate() {
        print_entity_line(i, entity);
        println!();
    }
    Ok(())
}
