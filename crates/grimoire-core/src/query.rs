//! Query/filter engine.
//!
//! Turns a [`SearchRequest`] into one or more [`StoreQuery`] scans. Every
//! filter becomes a typed [`Condition`]; operand values are coerced to the
//! column's declared type up front, so a store only ever binds typed
//! parameters.
//!
//! # Operators
//!
//! | Operator | Meaning | Columns |
//! |----------|---------|---------|
//! | `eq` (default) | case-sensitive exact match | all; membership on lists |
//! | `ilike` | case-insensitive exact match | text, lists |
//! | `like` | `*` wildcard, case-insensitive | text |
//! | `in` | any of a list of values | all |
//! | `range` | inclusive `_min`/`_max` bounds | numeric, challenge rating |
//!
//! # Name lookup
//!
//! The `name` filter is special. With a `*` in the input it is a plain
//! `like`. Otherwise it is tried as `ilike` on `name`, then as `eq` on
//! `identifier` with the input unmodified, stopping at the first step with
//! results. No match at any step is an empty result, not an error.
//!
//! `document_keys` is an `in` on `document_key`, ANDed with everything else
//! and evaluated by the store.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::error::QueryError;
use crate::models::{Entity, EntityKind};
use crate::normalize::{format_challenge_rating, parse_challenge_rating};
use crate::schema::{alias_table, AliasTable, AttrType};
use crate::store::{
    ColumnType, Condition, EntityStore, LikePattern, Predicate, ScalarValue, StoreQuery,
    DOCUMENT_KEY_COLUMN, IDENTIFIER_COLUMN, NAME_COLUMN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    ILike,
    Like,
    In,
    Range,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::ILike => "ilike",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::Range => "range",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eq" | "=" => Ok(Operator::Eq),
            "ilike" => Ok(Operator::ILike),
            "like" => Ok(Operator::Like),
            "in" => Ok(Operator::In),
            "range" => Ok(Operator::Range),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }
}

/// Operand of a [`Filter`], before type coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    One(Value),
    Many(Vec<Value>),
    Bounds { min: Option<Value>, max: Option<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: FilterValue,
}

/// Default and ceiling for result counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 500,
        }
    }
}

impl QueryLimits {
    /// Resolve a caller-supplied limit: absent means `default_limit`, larger
    /// than `max_limit` is capped, and anything below 1 is rejected.
    pub fn clamp(&self, requested: Option<i64>) -> Result<i64, QueryError> {
        match requested {
            Some(n) if n < 1 => Err(invalid("limit", "positive integer", &Value::from(n))),
            Some(n) => Ok(n.min(self.max_limit.max(1))),
            None => Ok(self.default_limit.clamp(1, self.max_limit.max(1))),
        }
    }
}

/// A search over one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub kind: EntityKind,
    pub name: Option<String>,
    pub document_keys: Vec<String>,
    pub filters: Vec<Filter>,
    pub limit: Option<i64>,
}

impl SearchRequest {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            name: None,
            document_keys: Vec::new(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn documents<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            operator,
            value,
        });
        self
    }

    /// Shorthand for an `eq` filter.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Operator::Eq, FilterValue::One(value.into()))
    }

    pub fn range(self, field: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.filter(
            field,
            Operator::Range,
            FilterValue::Bounds {
                min: min.map(Value::from),
                max: max.map(Value::from),
            },
        )
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse a flat parameter map.
    ///
    /// | Key | Meaning |
    /// |-----|---------|
    /// | `name` | name lookup (with fallback) |
    /// | `document_keys` | string or array of document keys |
    /// | `limit` | result cap |
    /// | `<attr>_min`, `<attr>_max` | range bounds |
    /// | `<attr>` | scalar → `eq`, array → `in`, `{"op": .., "value": ..}` → explicit |
    pub fn from_params(
        kind: EntityKind,
        params: &serde_json::Map<String, Value>,
    ) -> Result<Self, QueryError> {
        let table = alias_table(kind);
        let mut request = SearchRequest::new(kind);
        let mut bounds: Vec<(String, Option<Value>, Option<Value>)> = Vec::new();

        for (key, value) in params {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "name" => request.name = Some(text_param(key, value)?),
                "document_keys" | "document_key" | "documents" => {
                    request.document_keys.extend(string_list(key, value)?);
                }
                "limit" => {
                    request.limit = Some(value.as_i64().ok_or_else(|| {
                        invalid(key, "integer", value)
                    })?);
                }
                _ if column_for(table, key).is_some() => {
                    request.filters.push(filter_param(key, value)?);
                }
                _ => {
                    let (base, is_min) = match (key.strip_suffix("_min"), key.strip_suffix("_max")) {
                        (Some(base), _) => (base, true),
                        (_, Some(base)) => (base, false),
                        _ => return Err(unknown(kind, key)),
                    };
                    if table.attribute(base).is_none() {
                        return Err(unknown(kind, key));
                    }
                    let slot = match bounds.iter().position(|(f, _, _)| f == base) {
                        Some(i) => i,
                        None => {
                            bounds.push((base.to_string(), None, None));
                            bounds.len() - 1
                        }
                    };
                    if is_min {
                        bounds[slot].1 = Some(value.clone());
                    } else {
                        bounds[slot].2 = Some(value.clone());
                    }
                }
            }
        }

        for (field, min, max) in bounds {
            request.filters.push(Filter {
                field,
                operator: Operator::Range,
                value: FilterValue::Bounds { min, max },
            });
        }
        Ok(request)
    }
}

fn text_param(key: &str, value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(key, "string", other)),
    }
}

fn string_list(key: &str, value: &Value) -> Result<Vec<String>, QueryError> {
    match value {
        Value::Array(items) => items.iter().map(|v| text_param(key, v)).collect(),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()),
        other => Err(invalid(key, "string or list of strings", other)),
    }
}

fn filter_param(key: &str, value: &Value) -> Result<Filter, QueryError> {
    let (operator, operand) = match value {
        Value::Object(spec) => {
            let op = spec
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(key, "object with an \"op\" string", value))?
                .parse::<Operator>()?;
            let operand = spec.get("value").cloned().unwrap_or(Value::Null);
            (op, operand)
        }
        Value::Array(_) => (Operator::In, value.clone()),
        _ => (Operator::Eq, value.clone()),
    };
    let value = match (operator, operand) {
        (Operator::Range, Value::Array(pair)) if pair.len() == 2 => FilterValue::Bounds {
            min: Some(pair[0].clone()).filter(|v| !v.is_null()),
            max: Some(pair[1].clone()).filter(|v| !v.is_null()),
        },
        (Operator::Range, Value::Object(m)) => FilterValue::Bounds {
            min: m.get("min").cloned().filter(|v| !v.is_null()),
            max: m.get("max").cloned().filter(|v| !v.is_null()),
        },
        (Operator::Range, other) => return Err(invalid(key, "[min, max] or {min, max}", &other)),
        (_, Value::Array(items)) => FilterValue::Many(items),
        (_, other) => FilterValue::One(other),
    };
    Ok(Filter {
        field: key.to_string(),
        operator,
        value,
    })
}

fn invalid(field: &str, expected: &str, received: &Value) -> QueryError {
    QueryError::InvalidValue {
        field: field.to_string(),
        expected: expected.to_string(),
        received: received.to_string(),
    }
}

fn unknown(kind: EntityKind, field: &str) -> QueryError {
    QueryError::UnknownField {
        kind: kind.to_string(),
        field: field.to_string(),
    }
}

fn unsupported(field: &str, operator: Operator) -> QueryError {
    QueryError::UnsupportedOperator {
        field: field.to_string(),
        operator: operator.to_string(),
    }
}

/// Declared type of a filterable field of `table`.
fn column_for(table: &AliasTable, field: &str) -> Option<AttrType> {
    match field {
        IDENTIFIER_COLUMN | NAME_COLUMN | DOCUMENT_KEY_COLUMN => Some(AttrType::Text),
        _ => table.attribute(field).map(|spec| spec.ty),
    }
}

/// Coerce one operand to the declared type of `field`.
fn operand(field: &str, ty: AttrType, value: &Value) -> Result<ScalarValue, QueryError> {
    let scalar = match ty {
        AttrType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .map(ScalarValue::Int),
        AttrType::Float => number(value).map(ScalarValue::Float),
        AttrType::Bool => match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().and_then(|i| match i {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            }),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
        .map(ScalarValue::Bool),
        AttrType::Text => scalar_text(value).map(ScalarValue::Text),
        AttrType::Category | AttrType::List => {
            scalar_text(value).map(|s| ScalarValue::Text(s.to_lowercase()))
        }
        AttrType::ChallengeRating => match value {
            Value::String(s) => parse_challenge_rating(s),
            other => number(other),
        }
        .map(|cr| ScalarValue::Text(format_challenge_rating(cr))),
    };
    scalar.ok_or_else(|| invalid(field, ty.name(), value))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn one<'a>(filter: &'a Filter) -> Result<&'a Value, QueryError> {
    match &filter.value {
        FilterValue::One(v) => Ok(v),
        FilterValue::Many(items) if items.len() == 1 => Ok(&items[0]),
        FilterValue::Many(items) => Err(invalid(
            &filter.field,
            "a single value",
            &Value::Array(items.clone()),
        )),
        FilterValue::Bounds { .. } => Err(unsupported(&filter.field, filter.operator)),
    }
}

/// Translate one filter into a store condition.
pub fn build_condition(table: &AliasTable, filter: &Filter) -> Result<Condition, QueryError> {
    let field = filter.field.as_str();
    let ty = column_for(table, field).ok_or_else(|| unknown(table.kind, field))?;
    let column_type = ColumnType::from(ty);

    let condition = match filter.operator {
        Operator::Eq => Condition::new(
            field,
            column_type,
            Predicate::Eq(operand(field, ty, one(filter)?)?),
        ),
        Operator::ILike => {
            if !matches!(column_type, ColumnType::Text | ColumnType::List) {
                return Err(unsupported(field, filter.operator));
            }
            let value = one(filter)?;
            let text = scalar_text(value).ok_or_else(|| invalid(field, "string", value))?;
            Condition::new(field, column_type, Predicate::ILike(text))
        }
        Operator::Like => {
            if column_type != ColumnType::Text {
                return Err(unsupported(field, filter.operator));
            }
            let value = one(filter)?;
            let pattern = scalar_text(value).ok_or_else(|| invalid(field, "string", value))?;
            Condition::new(field, column_type, Predicate::Like(LikePattern::new(&pattern)))
        }
        Operator::In => {
            let values = match &filter.value {
                FilterValue::Many(items) => items.clone(),
                FilterValue::One(v) => vec![v.clone()],
                FilterValue::Bounds { .. } => return Err(unsupported(field, filter.operator)),
            };
            if values.is_empty() {
                return Err(invalid(field, "a non-empty list", &Value::Array(values)));
            }
            let operands = values
                .iter()
                .map(|v| operand(field, ty, v))
                .collect::<Result<Vec<_>, _>>()?;
            Condition::new(field, column_type, Predicate::In(operands))
        }
        Operator::Range => {
            let spec = table
                .range_column(field)
                .ok_or_else(|| unsupported(field, filter.operator))?;
            let FilterValue::Bounds { min, max } = &filter.value else {
                return Err(unsupported(field, filter.operator));
            };
            let bound = |v: &Option<Value>| -> Result<Option<f64>, QueryError> {
                match v {
                    None => Ok(None),
                    Some(Value::String(s)) if ty == AttrType::ChallengeRating => parse_challenge_rating(s)
                        .map(Some)
                        .ok_or_else(|| invalid(field, "challenge rating", &Value::String(s.clone()))),
                    Some(v) => number(v).map(Some).ok_or_else(|| invalid(field, "number", v)),
                }
            };
            let (min, max) = (bound(min)?, bound(max)?);
            if min.is_none() && max.is_none() {
                return Err(invalid(field, "at least one bound", &Value::Null));
            }
            Condition::new(spec.name, ColumnType::from(spec.ty), Predicate::Range { min, max })
        }
    };
    Ok(condition)
}

/// Conditions shared by every step of a search: document keys and filters.
pub fn build_conditions(request: &SearchRequest) -> Result<Vec<Condition>, QueryError> {
    let table = alias_table(request.kind);
    let mut conditions = Vec::with_capacity(request.filters.len() + 1);
    if !request.document_keys.is_empty() {
        conditions.push(Condition::new(
            DOCUMENT_KEY_COLUMN,
            ColumnType::Text,
            Predicate::In(
                request
                    .document_keys
                    .iter()
                    .cloned()
                    .map(ScalarValue::Text)
                    .collect(),
            ),
        ));
    }
    for filter in &request.filters {
        conditions.push(build_condition(table, filter)?);
    }
    Ok(conditions)
}

/// Run a search, applying the name fallback chain.
pub async fn search(
    store: &dyn EntityStore,
    request: &SearchRequest,
    limits: &QueryLimits,
) -> Result<Vec<Entity>> {
    let conditions = build_conditions(request)?;
    let limit = limits.clamp(request.limit)?;
    let scan = |extra: Condition| {
        let mut conditions = conditions.clone();
        conditions.push(extra);
        StoreQuery {
            kind: request.kind,
            conditions,
            limit,
        }
    };

    let Some(name) = request.name.as_deref().filter(|n| !n.trim().is_empty()) else {
        return store
            .query(&StoreQuery {
                kind: request.kind,
                conditions: conditions.clone(),
                limit,
            })
            .await;
    };

    if LikePattern::has_wildcard(name) {
        let like = Condition::new(
            NAME_COLUMN,
            ColumnType::Text,
            Predicate::Like(LikePattern::new(name)),
        );
        return store.query(&scan(like)).await;
    }

    let ilike = Condition::new(
        NAME_COLUMN,
        ColumnType::Text,
        Predicate::ILike(name.to_string()),
    );
    let hits = store.query(&scan(ilike)).await?;
    if !hits.is_empty() {
        return Ok(hits);
    }

    debug!(kind = %request.kind, name, "no name match, trying identifier");
    let by_id = Condition::new(
        IDENTIFIER_COLUMN,
        ColumnType::Text,
        Predicate::Eq(ScalarValue::Text(name.to_string())),
    );
    let hits = store.query(&scan(by_id)).await?;
    if hits.is_empty() {
        debug!(kind = %request.kind, name, "no identifier match");
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttrValue, DocumentRef, SourceOrigin};
    use crate::store::memory::InMemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn entity(kind: EntityKind, id: &str, name: &str, doc: &str, attrs: &[(&str, AttrValue)]) -> Entity {
        Entity {
            identifier: id.into(),
            name: name.into(),
            kind,
            source_origin: SourceOrigin::ApiPrimary,
            document: DocumentRef {
                key: Some(doc.into()),
                name: None,
                source: "api-primary".into(),
            },
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            payload: serde_json::Map::new(),
        }
    }

    fn spell(id: &str, name: &str, level: i64, doc: &str) -> Entity {
        entity(
            EntityKind::Spell,
            id,
            name,
            doc,
            &[
                ("level", AttrValue::Int(level)),
                ("school", AttrValue::Text("evocation".into())),
                ("classes", AttrValue::List(vec!["wizard".into(), "sorcerer".into()])),
            ],
        )
    }

    async fn fixture() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_batch(&[
                spell("fireball", "Fireball", 3, "srd-5e"),
                spell("fire-bolt", "Fire Bolt", 0, "srd-5e"),
                spell("wall-of-fire", "Wall of Fire", 4, "tce"),
                spell("magic-missile", "Magic Missile", 1, "phb"),
                spell("shatter", "Shatter", 2, "phb"),
                spell("lightning-bolt", "Lightning Bolt", 3, "tce"),
                spell("cone-of-cold", "Cone of Cold", 5, "srd-5e"),
            ])
            .await
            .unwrap();
        store
    }

    async fn names(store: &InMemoryStore, request: SearchRequest) -> Vec<String> {
        search(store, &request, &QueryLimits::default())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    #[tokio::test]
    async fn test_name_is_case_insensitive() {
        let store = fixture().await;
        for input in ["fireball", "FIREBALL", "Fireball"] {
            let hits = names(&store, SearchRequest::new(EntityKind::Spell).name(input)).await;
            assert_eq!(hits, vec!["Fireball"], "input {input}");
        }
    }

    #[tokio::test]
    async fn test_wildcard_name() {
        let store = fixture().await;
        let prefix = names(&store, SearchRequest::new(EntityKind::Spell).name("fire*")).await;
        assert_eq!(prefix, vec!["Fire Bolt", "Fireball"]);

        let infix = names(&store, SearchRequest::new(EntityKind::Spell).name("*fire*")).await;
        assert_eq!(infix, vec!["Fire Bolt", "Fireball", "Wall of Fire"]);
    }

    #[tokio::test]
    async fn test_identifier_fallback() {
        let store = InMemoryStore::new();
        store
            .upsert(&spell("fireball", "Feu Ardent", 3, "srd-5e"))
            .await
            .unwrap();
        let hits = names(&store, SearchRequest::new(EntityKind::Spell).name("fireball")).await;
        assert_eq!(hits, vec!["Feu Ardent"]);

        // identifier step is case-sensitive
        let hits = names(&store, SearchRequest::new(EntityKind::Spell).name("FIREBALL")).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let store = fixture().await;
        let hits = names(&store, SearchRequest::new(EntityKind::Spell).name("wish")).await;
        assert!(hits.is_empty());
        let hits = names(&store, SearchRequest::new(EntityKind::Creature).name("fire*")).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_document_keys_filter() {
        let store = fixture().await;
        let request = SearchRequest::new(EntityKind::Spell)
            .documents(["srd-5e", "tce"])
            .limit(3);
        let hits = search(&store, &request, &QueryLimits::default()).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits
            .iter()
            .all(|e| matches!(e.document.key.as_deref(), Some("srd-5e" | "tce"))));

        let bolts = names(
            &store,
            SearchRequest::new(EntityKind::Spell)
                .documents(["srd-5e", "tce"])
                .name("*bolt"),
        )
        .await;
        assert_eq!(bolts, vec!["Fire Bolt", "Lightning Bolt"]);
    }

    #[tokio::test]
    async fn test_level_range() {
        let store = fixture().await;
        let request = SearchRequest::new(EntityKind::Spell).range("level", Some(2.0), Some(4.0));
        let hits = search(&store, &request, &QueryLimits::default()).await.unwrap();
        let mut levels: Vec<i64> = hits
            .iter()
            .filter_map(|e| match e.attribute("level") {
                Some(AttrValue::Int(l)) => Some(*l),
                _ => None,
            })
            .collect();
        levels.sort();
        assert_eq!(levels, vec![2, 3, 3, 4]);
    }

    #[tokio::test]
    async fn test_limit_is_capped() {
        let store = fixture().await;
        let limits = QueryLimits {
            default_limit: 2,
            max_limit: 4,
        };
        let hits = search(&store, &SearchRequest::new(EntityKind::Spell), &limits).await.unwrap();
        assert_eq!(hits.len(), 2);
        let request = SearchRequest::new(EntityKind::Spell).limit(1000);
        assert_eq!(search(&store, &request, &limits).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_non_positive_limit_rejected() {
        let store = fixture().await;
        for limit in [0, -5] {
            let request = SearchRequest::new(EntityKind::Spell).limit(limit);
            let err = search(&store, &request, &QueryLimits::default())
                .await
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<QueryError>(),
                Some(QueryError::InvalidValue { field, .. }) if field == "limit"
            ));
        }
    }

    #[test]
    fn test_from_params() {
        let params = json!({
            "name": "fire*",
            "document_keys": ["srd-5e", "tce"],
            "level_min": 1,
            "level_max": "3",
            "school": "Evocation",
            "classes": {"op": "ilike", "value": "Wizard"},
            "limit": 5,
        });
        let request =
            SearchRequest::from_params(EntityKind::Spell, params.as_object().unwrap()).unwrap();
        assert_eq!(request.name.as_deref(), Some("fire*"));
        assert_eq!(request.document_keys, vec!["srd-5e", "tce"]);
        assert_eq!(request.limit, Some(5));

        let conditions = build_conditions(&request).unwrap();
        assert!(conditions.contains(&Condition::new(
            "school",
            ColumnType::Text,
            Predicate::Eq(ScalarValue::Text("evocation".into())),
        )));
        assert!(conditions.contains(&Condition::new(
            "level",
            ColumnType::Integer,
            Predicate::Range {
                min: Some(1.0),
                max: Some(3.0)
            },
        )));
        assert!(conditions.contains(&Condition::new(
            "classes",
            ColumnType::List,
            Predicate::ILike("Wizard".into()),
        )));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let params = json!({"damage_type": "fire"});
        let err = SearchRequest::from_params(EntityKind::Spell, params.as_object().unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                kind: "spell".into(),
                field: "damage_type".into()
            }
        );

        // a bound on a non-numeric attribute parses but cannot be built
        let params = json!({"school_min": 1});
        let request =
            SearchRequest::from_params(EntityKind::Spell, params.as_object().unwrap()).unwrap();
        assert!(matches!(
            build_conditions(&request),
            Err(QueryError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_operator_validation() {
        let table = alias_table(EntityKind::Spell);
        let like_on_int = Filter {
            field: "level".into(),
            operator: Operator::Like,
            value: FilterValue::One(json!("1*")),
        };
        assert!(matches!(
            build_condition(table, &like_on_int),
            Err(QueryError::UnsupportedOperator { .. })
        ));

        let range_on_text = Filter {
            field: "school".into(),
            operator: Operator::Range,
            value: FilterValue::Bounds {
                min: Some(json!(1)),
                max: None,
            },
        };
        assert!(matches!(
            build_condition(table, &range_on_text),
            Err(QueryError::UnsupportedOperator { .. })
        ));

        let bad_level = Filter {
            field: "level".into(),
            operator: Operator::Eq,
            value: FilterValue::One(json!("third")),
        };
        assert!(matches!(
            build_condition(table, &bad_level),
            Err(QueryError::InvalidValue { .. })
        ));
        assert!("between".parse::<Operator>().is_err());
    }

    #[test]
    fn test_challenge_rating_filters_use_canonical_forms() {
        let table = alias_table(EntityKind::Creature);
        let eq = Filter {
            field: "challenge_rating".into(),
            operator: Operator::Eq,
            value: FilterValue::One(json!(0.25)),
        };
        assert_eq!(
            build_condition(table, &eq).unwrap().predicate,
            Predicate::Eq(ScalarValue::Text("1/4".into()))
        );

        let range = Filter {
            field: "challenge_rating".into(),
            operator: Operator::Range,
            value: FilterValue::Bounds {
                min: Some(json!("1/2")),
                max: Some(json!(2)),
            },
        };
        let condition = build_condition(table, &range).unwrap();
        assert_eq!(condition.column, "challenge_rating_decimal");
        assert_eq!(
            condition.predicate,
            Predicate::Range {
                min: Some(0.5),
                max: Some(2.0)
            }
        );
    }
}
