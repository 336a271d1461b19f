//! API JSON dump reader.
//!
//! Accepts either a bare array of records or one API page object
//! (`{"count": .., "next": .., "results": [..]}`).

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use grimoire_core::RawRecord;

pub fn read_file(path: &Path) -> Result<Vec<RawRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    read_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn read_str(text: &str) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(text)?;
    let records = match value {
        Value::Array(items) => items,
        Value::Object(mut page) => match page.remove("results") {
            Some(Value::Array(items)) => items,
            _ => bail!("expected an array or an object with a \"results\" array"),
        },
        _ => bail!("expected an array or an object with a \"results\" array"),
    };
    Ok(records.into_iter().map(RawRecord::from_json).collect())
}
