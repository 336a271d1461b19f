//! Core data models shared by the normalizer, the stores, and the query engine.
//!
//! An [`Entity`] is one normalized record of a fixed [`EntityKind`]. Its
//! identity is `(kind, identifier)`; two kinds may reuse the same identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseTagError;

/// The category of an entity. Determines its indexed attribute schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Spell,
    Creature,
    Weapon,
    Armor,
    MagicItem,
    Background,
    Feat,
    Condition,
    Rule,
    Species,
    Class,
}

impl EntityKind {
    /// Every kind, in the order discovery and stats walk them.
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Spell,
        EntityKind::Creature,
        EntityKind::Weapon,
        EntityKind::Armor,
        EntityKind::MagicItem,
        EntityKind::Background,
        EntityKind::Feat,
        EntityKind::Condition,
        EntityKind::Rule,
        EntityKind::Species,
        EntityKind::Class,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Spell => "spell",
            EntityKind::Creature => "creature",
            EntityKind::Weapon => "weapon",
            EntityKind::Armor => "armor",
            EntityKind::MagicItem => "magic_item",
            EntityKind::Background => "background",
            EntityKind::Feat => "feat",
            EntityKind::Condition => "condition",
            EntityKind::Rule => "rule",
            EntityKind::Species => "species",
            EntityKind::Class => "class",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseTagError;

    /// Accepts the canonical tag plus the plural and hyphenated spellings
    /// used by the upstream APIs (`spells`, `magic-items`, `monsters`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase().replace('-', "_");
        let kind = match tag.as_str() {
            "spell" | "spells" => EntityKind::Spell,
            "creature" | "creatures" | "monster" | "monsters" => EntityKind::Creature,
            "weapon" | "weapons" => EntityKind::Weapon,
            "armor" | "armour" => EntityKind::Armor,
            "magic_item" | "magic_items" | "magicitem" | "magicitems" => EntityKind::MagicItem,
            "background" | "backgrounds" => EntityKind::Background,
            "feat" | "feats" => EntityKind::Feat,
            "condition" | "conditions" => EntityKind::Condition,
            "rule" | "rules" => EntityKind::Rule,
            "species" | "race" | "races" => EntityKind::Species,
            "class" | "classes" => EntityKind::Class,
            _ => {
                return Err(ParseTagError {
                    what: "entity kind",
                    value: s.to_string(),
                })
            }
        };
        Ok(kind)
    }
}

/// Which ingestion pipeline produced a record.
///
/// Each member has its own normalization strategy; see
/// [`normalize`](crate::normalize::normalize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceOrigin {
    /// Current-generation structured API (`key`, nested `document` object).
    #[serde(rename = "api-primary")]
    ApiPrimary,
    /// Legacy structured API (`slug`, flattened `document__slug`).
    #[serde(rename = "api-secondary")]
    ApiSecondary,
    /// User-supplied OrcBrew/EDN files.
    #[serde(rename = "user-import")]
    UserImport,
}

impl SourceOrigin {
    pub const ALL: [SourceOrigin; 3] = [
        SourceOrigin::ApiPrimary,
        SourceOrigin::ApiSecondary,
        SourceOrigin::UserImport,
    ];

    /// Origin tag, also used as `document_source`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOrigin::ApiPrimary => "api-primary",
            SourceOrigin::ApiSecondary => "api-secondary",
            SourceOrigin::UserImport => "user-import",
        }
    }

    /// Lax origins may omit every field except identifier and name.
    pub fn is_lax(&self) -> bool {
        matches!(self, SourceOrigin::UserImport)
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceOrigin {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceOrigin::ALL
            .into_iter()
            .find(|o| o.as_str() == s.trim())
            .ok_or_else(|| ParseTagError {
                what: "source origin",
                value: s.to_string(),
            })
    }
}

/// A typed indexed attribute value.
///
/// `Absent` is the explicit marker for a field the source did not provide;
/// it serializes as `null` and is stored as SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Absent,
}

impl AttrValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, AttrValue::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Provenance triple. `source` is always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub key: Option<String>,
    pub name: Option<String>,
    pub source: String,
}

/// One normalized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub identifier: String,
    pub name: String,
    pub kind: EntityKind,
    pub source_origin: SourceOrigin,
    pub document: DocumentRef,
    /// Kind-specific typed fields, one entry per declared attribute.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Everything else, for display.
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl Entity {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

/// Per-kind document count as reported by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCount {
    pub document_key: String,
    pub document_name: Option<String>,
    pub document_source: String,
    pub count: i64,
}

/// Optional publisher/license enrichment for a `(document_key, document_source)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_key: String,
    pub document_source: String,
    pub publisher: Option<String>,
    pub license: Option<String>,
    pub game_system: Option<String>,
}

/// One entry of [`list_documents`](crate::discovery::list_documents).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub document_key: String,
    pub document_name: Option<String>,
    pub source: String,
    pub entity_count: i64,
    pub entity_kind_counts: BTreeMap<EntityKind, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_system: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_aliases() {
        assert_eq!("spells".parse::<EntityKind>().unwrap(), EntityKind::Spell);
        assert_eq!("Monsters".parse::<EntityKind>().unwrap(), EntityKind::Creature);
        assert_eq!("magic-items".parse::<EntityKind>().unwrap(), EntityKind::MagicItem);
        assert!("vehicle".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_kind_tag_round_trips() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_origin_tags() {
        assert_eq!(
            "user-import".parse::<SourceOrigin>().unwrap(),
            SourceOrigin::UserImport
        );
        assert!(SourceOrigin::UserImport.is_lax());
        assert!(!SourceOrigin::ApiPrimary.is_lax());
        assert!("api".parse::<SourceOrigin>().is_err());
    }

    #[test]
    fn test_absent_serializes_as_null() {
        let json = serde_json::to_string(&AttrValue::Absent).unwrap();
        assert_eq!(json, "null");
        let back: AttrValue = serde_json::from_str("null").unwrap();
        assert!(back.is_absent());
    }
}
