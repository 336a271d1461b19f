//! Collection coercion.
//!
//! Format readers hand over [`RawValue`] trees that may contain
//! format-specific containers (EDN lists vs. vectors, sets, keyword keys,
//! tagged literals). [`coerce`] rewrites such a tree into [`Data`], which is
//! built only from scalars, ordered sequences, sets, and string-keyed maps.
//! No code downstream of this module ever matches on a reader-specific type.
//!
//! | Raw shape | Coerced shape |
//! |-----------|---------------|
//! | list, vector | `Seq` |
//! | set | `Set` (first-occurrence order, duplicates dropped) |
//! | map | `Map` (keys stringified; container keys rejected) |
//! | keyword, symbol, char | `Text` (keyword without the leading colon) |
//! | `#inst`, `#uuid` | `Text` |
//! | any other tagged literal | [`NormalizationError::StructuralParse`] |

use std::collections::BTreeMap;

use crate::error::NormalizationError;

/// A value as produced by a format reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Char(char),
    /// Keyword name without the leading `:` (may carry a `ns/` prefix).
    Keyword(String),
    Symbol(String),
    List(Vec<RawValue>),
    Vector(Vec<RawValue>),
    Set(Vec<RawValue>),
    /// Key/value pairs in source order.
    Map(Vec<(RawValue, RawValue)>),
    /// `#tag value`.
    Tagged(String, Box<RawValue>),
}

impl RawValue {
    fn type_name(&self) -> &'static str {
        match self {
            RawValue::Nil => "nil",
            RawValue::Bool(_) => "boolean",
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Text(_) => "string",
            RawValue::Char(_) => "character",
            RawValue::Keyword(_) => "keyword",
            RawValue::Symbol(_) => "symbol",
            RawValue::List(_) => "list",
            RawValue::Vector(_) => "vector",
            RawValue::Set(_) => "set",
            RawValue::Map(_) => "map",
            RawValue::Tagged(..) => "tagged literal",
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Nil,
            serde_json::Value::Bool(b) => RawValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Int(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => RawValue::Text(s),
            serde_json::Value::Array(items) => {
                RawValue::Vector(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(k, v)| (RawValue::Text(k), RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A value built only from the universal shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Seq(Vec<Data>),
    Set(Vec<Data>),
    Map(BTreeMap<String, Data>),
}

impl Data {
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Null => "null",
            Data::Bool(_) => "boolean",
            Data::Int(_) => "integer",
            Data::Float(_) => "float",
            Data::Text(_) => "string",
            Data::Seq(_) => "sequence",
            Data::Set(_) => "set",
            Data::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Data>> {
        match self {
            Data::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Data> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Null, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Data::Null => true,
            Data::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Sets collapse to arrays in member order.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Data::Null => serde_json::Value::Null,
            Data::Bool(b) => serde_json::Value::Bool(*b),
            Data::Int(i) => serde_json::Value::from(*i),
            Data::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Data::Text(s) => serde_json::Value::String(s.clone()),
            Data::Seq(items) | Data::Set(items) => {
                serde_json::Value::Array(items.iter().map(Data::to_json).collect())
            }
            Data::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Compact rendering for error messages, capped at 80 characters.
    pub fn preview(&self) -> String {
        let rendered = self.to_json().to_string();
        if rendered.chars().count() > 80 {
            let cut: String = rendered.chars().take(77).collect();
            format!("{}...", cut)
        } else {
            rendered
        }
    }
}

/// Recursively coerce a reader value into [`Data`].
pub fn coerce(value: RawValue) -> Result<Data, NormalizationError> {
    match value {
        RawValue::Nil => Ok(Data::Null),
        RawValue::Bool(b) => Ok(Data::Bool(b)),
        RawValue::Int(i) => Ok(Data::Int(i)),
        RawValue::Float(f) => Ok(Data::Float(f)),
        RawValue::Text(s) => Ok(Data::Text(s)),
        RawValue::Char(c) => Ok(Data::Text(c.to_string())),
        RawValue::Keyword(k) | RawValue::Symbol(k) => Ok(Data::Text(k)),
        RawValue::List(items) | RawValue::Vector(items) => items
            .into_iter()
            .map(coerce)
            .collect::<Result<Vec<_>, _>>()
            .map(Data::Seq),
        RawValue::Set(items) => {
            let mut members: Vec<Data> = Vec::with_capacity(items.len());
            for item in items {
                let member = coerce(item)?;
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            Ok(Data::Set(members))
        }
        RawValue::Map(pairs) => {
            let mut map = BTreeMap::new();
            for (k, v) in pairs {
                let key = map_key(k)?;
                map.insert(key, coerce(v)?);
            }
            Ok(Data::Map(map))
        }
        RawValue::Tagged(tag, inner) => match (tag.as_str(), *inner) {
            ("inst" | "uuid", RawValue::Text(s)) => Ok(Data::Text(s)),
            (tag, inner) => Err(NormalizationError::StructuralParse(format!(
                "unrecognized tagged value #{} {}",
                tag,
                inner.type_name()
            ))),
        },
    }
}

fn map_key(key: RawValue) -> Result<String, NormalizationError> {
    match key {
        RawValue::Text(s) | RawValue::Keyword(s) | RawValue::Symbol(s) => Ok(s),
        RawValue::Char(c) => Ok(c.to_string()),
        RawValue::Int(i) => Ok(i.to_string()),
        RawValue::Bool(b) => Ok(b.to_string()),
        other => Err(NormalizationError::StructuralParse(format!(
            "map key must be a scalar, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(s: &str) -> RawValue {
        RawValue::Keyword(s.to_string())
    }

    #[test]
    fn test_lists_and_vectors_become_sequences() {
        let raw = RawValue::List(vec![
            RawValue::Int(1),
            RawValue::Vector(vec![RawValue::Text("a".into())]),
        ]);
        let data = coerce(raw).unwrap();
        assert_eq!(
            data,
            Data::Seq(vec![
                Data::Int(1),
                Data::Seq(vec![Data::Text("a".into())])
            ])
        );
    }

    #[test]
    fn test_strings_pass_through_untouched() {
        let data = coerce(RawValue::Text("Fire Bolt".into())).unwrap();
        assert_eq!(data, Data::Text("Fire Bolt".into()));
    }

    #[test]
    fn test_sets_deduplicate_in_order() {
        let raw = RawValue::Set(vec![kw("wizard"), kw("sorcerer"), kw("wizard")]);
        let data = coerce(raw).unwrap();
        assert_eq!(
            data,
            Data::Set(vec![Data::Text("wizard".into()), Data::Text("sorcerer".into())])
        );
        assert_eq!(data.to_json(), serde_json::json!(["wizard", "sorcerer"]));
    }

    #[test]
    fn test_keyword_keys_are_stringified() {
        let raw = RawValue::Map(vec![
            (kw("name"), RawValue::Text("Fireball".into())),
            (kw("level"), RawValue::Int(3)),
        ]);
        let data = coerce(raw).unwrap();
        assert_eq!(data.get("name"), Some(&Data::Text("Fireball".into())));
        assert_eq!(data.get("level"), Some(&Data::Int(3)));
    }

    #[test]
    fn test_nested_containers_are_coerced() {
        let raw = RawValue::Map(vec![(
            kw("spell-lists"),
            RawValue::Map(vec![(kw("wizard"), RawValue::Bool(true))]),
        )]);
        let data = coerce(raw).unwrap();
        let lists = data.get("spell-lists").unwrap();
        assert_eq!(lists.get("wizard"), Some(&Data::Bool(true)));
    }

    #[test]
    fn test_container_keys_are_rejected() {
        let raw = RawValue::Map(vec![(RawValue::Vector(vec![]), RawValue::Nil)]);
        let err = coerce(raw).unwrap_err();
        assert!(matches!(err, NormalizationError::StructuralParse(_)));
    }

    #[test]
    fn test_unknown_tag_is_structural_error() {
        let raw = RawValue::Tagged("myapp/widget".into(), Box::new(RawValue::Int(1)));
        let err = coerce(raw).unwrap_err();
        assert!(err.to_string().contains("#myapp/widget"));

        let inst = RawValue::Tagged("inst".into(), Box::new(RawValue::Text("1985".into())));
        assert_eq!(coerce(inst).unwrap(), Data::Text("1985".into()));
    }

    #[test]
    fn test_from_json() {
        let raw = RawValue::from(serde_json::json!({"a": [1, 2.5, null]}));
        let data = coerce(raw).unwrap();
        assert_eq!(
            data.get("a"),
            Some(&Data::Seq(vec![Data::Int(1), Data::Float(2.5), Data::Null]))
        );
    }

    #[test]
    fn test_preview_truncates() {
        let data = Data::Text("x".repeat(200));
        assert_eq!(data.preview().chars().count(), 80);
    }
}
