//! OrcBrew (`.orcbrew` / `.edn`) reader.
//!
//! An OrcBrew export is an EDN map of book name to plugin map:
//!
//! ```text
//! {"Frozen North"
//!  {:orcpub.dnd.e5/spells {:frost-lance {:name "Frost Lance" :level 2 ...}}
//!   :orcpub.dnd.e5/monsters {...}}}
//! ```
//!
//! Each plugin key selects an [`EntityKind`]; each entity is emitted as a
//! [`RawRecord`] whose container is the book name. A file holding a single
//! plugin map (no book level) is read the same way with no container.
//! Plugins that hold no cacheable kind (`subclasses`, `languages`, ...) are
//! skipped.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;

use grimoire_core::coerce::RawValue;
use grimoire_core::edn;
use grimoire_core::{EntityKind, RawRecord};

const PLUGIN_NAMESPACE: &str = "orcpub.dnd.e5/";

/// Records read from one file, grouped by kind.
pub type KindBatches = BTreeMap<EntityKind, Vec<RawRecord>>;

fn plugin_kind(name: &str) -> Option<EntityKind> {
    match name {
        "spells" => Some(EntityKind::Spell),
        "monsters" => Some(EntityKind::Creature),
        "backgrounds" => Some(EntityKind::Background),
        "feats" => Some(EntityKind::Feat),
        "races" => Some(EntityKind::Species),
        "classes" => Some(EntityKind::Class),
        "magic-items" => Some(EntityKind::MagicItem),
        "weapons" => Some(EntityKind::Weapon),
        "armor" => Some(EntityKind::Armor),
        _ => None,
    }
}

fn plugin_name(key: &RawValue) -> Option<&str> {
    match key {
        RawValue::Keyword(k) => k.strip_prefix(PLUGIN_NAMESPACE),
        _ => None,
    }
}

pub fn read_file(path: &Path) -> Result<KindBatches> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    read_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn read_str(text: &str) -> Result<KindBatches> {
    let root = edn::parse(text)?;
    let RawValue::Map(pairs) = root else {
        bail!("top level must be a map of book name to plugin");
    };

    let mut batches = KindBatches::new();
    if pairs.iter().any(|(k, _)| plugin_name(k).is_some()) {
        read_plugin(&pairs, None, &mut batches);
        return Ok(batches);
    }

    for (book, plugin) in pairs {
        let book = match book {
            RawValue::Text(s) | RawValue::Keyword(s) | RawValue::Symbol(s) => s,
            other => bail!("book name must be a string, got {:?}", other),
        };
        let RawValue::Map(plugin) = plugin else {
            debug!(book = %book, "book is not a plugin map, skipping");
            continue;
        };
        read_plugin(&plugin, Some(&book), &mut batches);
    }
    Ok(batches)
}

fn read_plugin(plugin: &[(RawValue, RawValue)], book: Option<&str>, batches: &mut KindBatches) {
    for (key, entries) in plugin {
        let Some(name) = plugin_name(key) else {
            continue;
        };
        let Some(kind) = plugin_kind(name) else {
            debug!(plugin = name, book = ?book, "no cacheable kind for plugin, skipping");
            continue;
        };

        let records = batches.entry(kind).or_default();
        match entries {
            RawValue::Map(by_key) => {
                for (entity_key, entity) in by_key {
                    records.push(wrap(with_key(entity.clone(), entity_key), book));
                }
            }
            RawValue::Vector(items) | RawValue::List(items) | RawValue::Set(items) => {
                for entity in items {
                    records.push(wrap(entity.clone(), book));
                }
            }
            _ => debug!(plugin = name, "plugin body is not a collection, skipping"),
        }
    }
}

/// Entities keyed by keyword often omit `:key` inside the body.
fn with_key(entity: RawValue, entity_key: &RawValue) -> RawValue {
    match entity {
        RawValue::Map(mut fields) => {
            let has_key = fields
                .iter()
                .any(|(k, _)| matches!(k, RawValue::Keyword(s) if s == "key"));
            if !has_key {
                if let RawValue::Keyword(k) | RawValue::Text(k) = entity_key {
                    fields.push((RawValue::Keyword("key".into()), RawValue::Keyword(k.clone())));
                }
            }
            RawValue::Map(fields)
        }
        other => other,
    }
}

fn wrap(value: RawValue, book: Option<&str>) -> RawRecord {
    match book {
        Some(book) => RawRecord::with_container(value, book),
        None => RawRecord::new(value),
    }
}
