//! Storage abstraction for grimoire.
//!
//! The [`EntityStore`] trait is the physical cache the normalizer writes to
//! and the query engine reads from. Entities are keyed by
//! `(kind, identifier)`; each kind is logically its own store.
//!
//! Implementations must be `Send + Sync` and must guarantee:
//!
//! - [`upsert_batch`](EntityStore::upsert_batch) is all-or-nothing, and no
//!   reader ever observes a partially applied batch.
//! - [`query`](EntityStore::query) evaluates every [`Condition`] and the
//!   limit itself. Callers never filter or truncate afterwards.
//! - Results are ordered by `name`, then `identifier`.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AttrValue, DocumentCount, DocumentMetadata, Entity, EntityKind};
use crate::schema::AttrType;

/// Columns every kind carries besides its indexed attributes.
pub const IDENTIFIER_COLUMN: &str = "identifier";
pub const NAME_COLUMN: &str = "name";
pub const DOCUMENT_KEY_COLUMN: &str = "document_key";

/// Physical representation of a filterable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
    /// Ordered string list, matched by membership.
    List,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Real)
    }
}

impl From<AttrType> for ColumnType {
    fn from(ty: AttrType) -> Self {
        match ty {
            AttrType::Int => ColumnType::Integer,
            AttrType::Float => ColumnType::Real,
            AttrType::Bool => ColumnType::Boolean,
            AttrType::Text | AttrType::Category | AttrType::ChallengeRating => ColumnType::Text,
            AttrType::List => ColumnType::List,
        }
    }
}

/// A typed filter operand, already coerced to its column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ScalarValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(i) => Some(*i as f64),
            ScalarValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Exact, case-sensitive comparison. A list value matches if any member does.
    pub fn equals(&self, value: &AttrValue) -> bool {
        match (self, value) {
            (ScalarValue::Text(s), AttrValue::Text(t)) => s == t,
            (ScalarValue::Text(s), AttrValue::List(items)) => items.iter().any(|i| i == s),
            (ScalarValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (scalar, value) => match (scalar.as_f64(), value.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

/// A `*`-wildcard pattern, matched case-insensitively.
///
/// Stored as the literal segments between wildcards, so `fire*` is
/// `["fire", ""]` and `*fire*` is `["", "fire", ""]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    segments: Vec<String>,
}

impl LikePattern {
    pub const WILDCARD: char = '*';

    pub fn new(pattern: &str) -> Self {
        Self {
            segments: pattern
                .to_lowercase()
                .split(Self::WILDCARD)
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn has_wildcard(input: &str) -> bool {
        input.contains(Self::WILDCARD)
    }

    /// SQL `LIKE` pattern using `%` and `\` as escape; pair with `ESCAPE '\'`.
    pub fn to_sql(&self) -> String {
        self.segments
            .iter()
            .map(|seg| {
                let mut escaped = String::with_capacity(seg.len());
                for c in seg.chars() {
                    if matches!(c, '%' | '_' | '\\') {
                        escaped.push('\\');
                    }
                    escaped.push(c);
                }
                escaped
            })
            .collect::<Vec<_>>()
            .join("%")
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        let (first, rest) = match self.segments.split_first() {
            Some(split) => split,
            None => return text.is_empty(),
        };
        if rest.is_empty() {
            return text == *first;
        }
        let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
            return false;
        };
        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return true,
        };
        for seg in middle {
            match remaining.find(seg.as_str()) {
                Some(pos) => remaining = &remaining[pos + seg.len()..],
                None => return false,
            }
        }
        remaining.ends_with(last.as_str())
    }
}

/// One operator applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-sensitive exact match.
    Eq(ScalarValue),
    /// Case-insensitive exact match against the lower-cased column.
    ILike(String),
    /// Case-insensitive wildcard match.
    Like(LikePattern),
    /// Any of the values, each compared as [`Predicate::Eq`].
    In(Vec<ScalarValue>),
    /// Inclusive numeric bounds; at least one is set.
    Range { min: Option<f64>, max: Option<f64> },
}

impl Predicate {
    /// Reference semantics for a stored value. Absent values never match.
    pub fn matches(&self, value: &AttrValue) -> bool {
        match self {
            Predicate::Eq(v) => v.equals(value),
            Predicate::ILike(s) => {
                let needle = s.to_lowercase();
                match value {
                    AttrValue::Text(t) => t.to_lowercase() == needle,
                    AttrValue::List(items) => items.iter().any(|i| i.to_lowercase() == needle),
                    _ => false,
                }
            }
            Predicate::Like(pattern) => value.as_text().is_some_and(|t| pattern.matches(t)),
            Predicate::In(values) => values.iter().any(|v| v.equals(value)),
            Predicate::Range { min, max } => match value.as_f64() {
                Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
                None => false,
            },
        }
    }
}

/// A predicate bound to a column of the queried kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub column_type: ColumnType,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(column: impl Into<String>, column_type: ColumnType, predicate: Predicate) -> Self {
        Self {
            column: column.into(),
            column_type,
            predicate,
        }
    }
}

/// A fully validated scan: every condition is ANDed, `limit` is final.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub kind: EntityKind,
    pub conditions: Vec<Condition>,
    pub limit: i64,
}

/// Value of `column` on `entity`, as the store would compare it.
pub fn column_value(entity: &Entity, column: &str) -> AttrValue {
    match column {
        IDENTIFIER_COLUMN => AttrValue::Text(entity.identifier.clone()),
        NAME_COLUMN => AttrValue::Text(entity.name.clone()),
        DOCUMENT_KEY_COLUMN => entity
            .document
            .key
            .clone()
            .map(AttrValue::Text)
            .unwrap_or(AttrValue::Absent),
        attr => entity.attribute(attr).cloned().unwrap_or(AttrValue::Absent),
    }
}

/// Abstract cache backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](EntityStore::upsert) | Insert or wholly replace one entity |
/// | [`upsert_batch`](EntityStore::upsert_batch) | Atomic multi-entity upsert |
/// | [`get`](EntityStore::get) | Point lookup by identifier |
/// | [`query`](EntityStore::query) | Attribute-filtered, limited, ordered scan |
/// | [`document_counts`](EntityStore::document_counts) | Distinct documents of one kind with counts |
/// | [`document_metadata`](EntityStore::document_metadata) | Enrichment side table |
/// | [`purge`](EntityStore::purge) | Remove every entity of a kind |
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn upsert(&self, entity: &Entity) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(entity)).await.map(|_| ())
    }

    /// Write every entity or none. Returns the number written.
    async fn upsert_batch(&self, entities: &[Entity]) -> Result<usize>;

    async fn get(&self, kind: EntityKind, identifier: &str) -> Result<Option<Entity>>;

    async fn query(&self, query: &StoreQuery) -> Result<Vec<Entity>>;

    /// Distinct `(document_key, document_name, document_source)` of `kind`,
    /// ignoring entities without a document key.
    async fn document_counts(&self, kind: EntityKind) -> Result<Vec<DocumentCount>>;

    async fn document_metadata(&self) -> Result<Vec<DocumentMetadata>>;

    async fn upsert_document_metadata(&self, metadata: &DocumentMetadata) -> Result<()>;

    /// Returns the number of entities removed.
    async fn purge(&self, kind: EntityKind) -> Result<u64>;

    async fn count(&self, kind: EntityKind) -> Result<i64>;
}
