//! Canonical normalizer.
//!
//! Maps one raw source record onto the canonical [`Entity`] shape for its
//! kind, driven entirely by the kind's [`AliasTable`].
//!
//! # Algorithm
//!
//! 1. Coerce the raw tree ([`coerce`]) and require a mapping at the top.
//! 2. Canonicalize field names (lowercase, `-`/space → `_`).
//! 3. Resolve the identifier: explicit identifier fields in table order,
//!    then a slug derived from the name.
//! 4. Extract the document triple ([`extract_document`]).
//! 5. Coerce each declared attribute to its declared type. Missing required
//!    attributes fail for strict origins and become [`AttrValue::Absent`] for
//!    lax ones.
//! 6. Apply derivations (challenge rating text ↔ decimal).
//! 7. Build the payload: canonical payload fields (explicit `null` when
//!    absent) plus every source field not consumed above.
//!
//! The result depends only on the input record, so normalizing the same
//! record twice yields identical entities.

use std::collections::{BTreeMap, BTreeSet};

use crate::coerce::{coerce, Data, RawValue};
use crate::document::{extract_document, DOCUMENT_FIELDS};
use crate::error::NormalizationError;
use crate::models::{AttrValue, Entity, EntityKind, SourceOrigin};
use crate::schema::{alias_table, AliasTable, AttrSpec, AttrType, Derivation, PayloadField};

/// A reader record plus the container it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub value: RawValue,
    /// Enclosing book/collection name, for imports that nest entities in one.
    pub container: Option<String>,
}

impl RawRecord {
    pub fn new(value: RawValue) -> Self {
        Self {
            value,
            container: None,
        }
    }

    pub fn with_container(value: RawValue, container: impl Into<String>) -> Self {
        Self {
            value,
            container: Some(container.into()),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        Self::new(RawValue::from(value))
    }
}

/// A coerced record with canonical field names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: BTreeMap<String, Data>,
    pub container: Option<String>,
}

impl Record {
    /// Coerce a raw record; the top level must be a mapping.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, NormalizationError> {
        let data = coerce(raw.value.clone())?;
        let Data::Map(map) = data else {
            return Err(NormalizationError::StructuralParse(format!(
                "record must be a mapping, got {}",
                data.type_name()
            )));
        };
        let fields = map
            .into_iter()
            .map(|(k, v)| (canonical_key(&k), v))
            .collect();
        Ok(Self {
            fields,
            container: raw.container.clone(),
        })
    }

    /// First non-blank field among `aliases`, with the alias that matched.
    pub fn first(&self, aliases: &[&'static str]) -> Option<(&'static str, &Data)> {
        aliases.iter().find_map(|alias| {
            self.fields
                .get(*alias)
                .filter(|v| !v.is_blank())
                .map(|v| (*alias, v))
        })
    }

    pub fn text(&self, aliases: &[&'static str]) -> Option<&str> {
        self.first(aliases)
            .and_then(|(_, v)| v.as_str())
            .map(str::trim)
    }
}

/// Canonical spelling of a source field name.
pub fn canonical_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Lowercase, collapse every run of non-alphanumerics to one hyphen, trim hyphens.
///
/// ```
/// use grimoire_core::normalize::slugify;
/// assert_eq!(slugify("Tasha's Hideous Laughter"), "tasha-s-hideous-laughter");
/// assert_eq!(slugify("  --Fire   Bolt!! "), "fire-bolt");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Normalize one record of `kind` from `origin`.
pub fn normalize(
    raw: &RawRecord,
    origin: SourceOrigin,
    kind: EntityKind,
) -> Result<Entity, NormalizationError> {
    normalize_with(alias_table(kind), raw, origin)
}

/// Normalize against an explicit alias table.
pub fn normalize_with(
    table: &AliasTable,
    raw: &RawRecord,
    origin: SourceOrigin,
) -> Result<Entity, NormalizationError> {
    let record = Record::from_raw(raw)?;
    let mut consumed: BTreeSet<&str> = BTreeSet::new();

    let name = match record.first(table.name) {
        Some((alias, Data::Text(s))) => {
            consumed.insert(alias);
            Some(s.trim().to_string())
        }
        Some((_, other)) => {
            return Err(NormalizationError::validation(
                "name",
                "string",
                other.preview(),
            ))
        }
        None => None,
    };

    let identifier = resolve_identifier(table, &record, name.as_deref(), &mut consumed)?;
    let name = name.ok_or_else(|| NormalizationError::validation("name", "string", "absent"))?;

    let document = extract_document(&record, origin);
    consumed.extend(DOCUMENT_FIELDS.iter().copied());

    let mut attributes = BTreeMap::new();
    for spec in table.attributes {
        consumed.extend(spec.aliases.iter().copied());
        let value = match record.first(spec.aliases) {
            Some((_, data)) => coerce_attribute(spec, data)?,
            None => AttrValue::Absent,
        };
        if value.is_absent() && spec.required && !origin.is_lax() {
            return Err(NormalizationError::validation(
                spec.name,
                spec.ty.name(),
                "absent",
            ));
        }
        attributes.insert(spec.name.to_string(), value);
    }

    for derivation in table.derivations {
        apply_derivation(derivation, &mut attributes, origin)?;
    }

    let mut payload = serde_json::Map::new();
    for field in table.payload {
        consumed.extend(field.aliases.iter().copied());
        payload.insert(field.name.to_string(), payload_value(field, &record));
    }
    for (key, value) in &record.fields {
        if !consumed.contains(key.as_str()) {
            payload.entry(key.clone()).or_insert_with(|| value.to_json());
        }
    }

    Ok(Entity {
        identifier,
        name,
        kind: table.kind,
        source_origin: origin,
        document,
        attributes,
        payload,
    })
}

fn resolve_identifier(
    table: &AliasTable,
    record: &Record,
    name: Option<&str>,
    consumed: &mut BTreeSet<&'static str>,
) -> Result<String, NormalizationError> {
    if let Some((alias, value)) = record.first(table.identifier) {
        consumed.insert(alias);
        return match value {
            Data::Text(s) => Ok(s.trim().to_string()),
            Data::Int(i) => Ok(i.to_string()),
            other => Err(NormalizationError::validation(
                alias,
                "string",
                other.preview(),
            )),
        };
    }

    let name = name.ok_or_else(|| {
        NormalizationError::IdentifierResolution(format!(
            "record has none of {:?} and no name",
            table.identifier
        ))
    })?;
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(NormalizationError::IdentifierResolution(format!(
            "name {:?} has no alphanumeric characters",
            name
        )));
    }
    Ok(slug)
}

fn payload_value(field: &PayloadField, record: &Record) -> serde_json::Value {
    match record.first(field.aliases) {
        None => serde_json::Value::Null,
        Some((_, Data::Seq(items))) if field.text && items.iter().all(|i| i.as_str().is_some()) => {
            let paragraphs: Vec<&str> = items.iter().filter_map(Data::as_str).collect();
            serde_json::Value::String(paragraphs.join("\n\n"))
        }
        Some((_, value)) => value.to_json(),
    }
}

/// Coerce `data` to the declared type of `spec`.
pub fn coerce_attribute(spec: &AttrSpec, data: &Data) -> Result<AttrValue, NormalizationError> {
    let coerced = match spec.ty {
        AttrType::Int => coerce_int(data).map(AttrValue::Int),
        AttrType::Float => coerce_float(data).map(AttrValue::Float),
        AttrType::Bool => coerce_bool(data).map(AttrValue::Bool),
        AttrType::Text => coerce_text(data).map(AttrValue::Text),
        AttrType::Category => coerce_text(data).map(|s| AttrValue::Text(s.to_lowercase())),
        AttrType::List => coerce_list(data).map(AttrValue::List),
        AttrType::ChallengeRating => coerce_challenge_rating(data).map(AttrValue::Text),
    };
    coerced.ok_or_else(|| NormalizationError::validation(spec.name, spec.ty.name(), data.preview()))
}

fn coerce_int(data: &Data) -> Option<i64> {
    match data {
        Data::Int(i) => Some(*i),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        Data::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(data: &Data) -> Option<f64> {
    let value = match data {
        Data::Int(i) => *i as f64,
        Data::Float(f) => *f,
        Data::Text(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn coerce_bool(data: &Data) -> Option<bool> {
    match data {
        Data::Bool(b) => Some(*b),
        Data::Int(0) => Some(false),
        Data::Int(1) => Some(true),
        Data::Text(s) => {
            let s = s.trim().to_lowercase();
            match s.as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                // legacy API spells attunement out: "requires attunement by a wizard"
                _ if s.starts_with("requires") => Some(true),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Text, numbers rendered as text, or an object reference's `name`.
fn coerce_text(data: &Data) -> Option<String> {
    match data {
        Data::Text(s) => Some(s.trim().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Map(m) => m.get("name").and_then(Data::as_str).map(|s| s.trim().to_string()),
        _ => None,
    }
}

/// Class lists arrive as lists of strings, lists of `{name: ..}` objects,
/// comma-separated strings, or `{class true}` maps.
fn coerce_list(data: &Data) -> Option<Vec<String>> {
    let raw: Vec<String> = match data {
        Data::Seq(items) | Data::Set(items) => items
            .iter()
            .map(coerce_text)
            .collect::<Option<Vec<_>>>()?,
        Data::Text(s) => s.split(',').map(str::to_string).collect(),
        Data::Map(m) => m
            .iter()
            .filter(|(_, v)| !matches!(v, Data::Null | Data::Bool(false)))
            .map(|(k, _)| k.clone())
            .collect(),
        _ => return None,
    };

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for item in raw {
        let item = item.trim().to_lowercase();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    Some(out)
}

fn coerce_challenge_rating(data: &Data) -> Option<String> {
    let value = match data {
        Data::Text(s) => parse_challenge_rating(s)?,
        other => coerce_float(other)?,
    };
    (value >= 0.0).then(|| format_challenge_rating(value))
}

/// Parse `"1/4"`, `"0.25"`, or `"5"` into a decimal.
pub fn parse_challenge_rating(text: &str) -> Option<f64> {
    let text = text.trim();
    let value = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => text.parse().ok()?,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Render a decimal challenge rating in its conventional fraction form.
pub fn format_challenge_rating(value: f64) -> String {
    const FRACTIONS: [(f64, &str); 3] = [(0.125, "1/8"), (0.25, "1/4"), (0.5, "1/2")];
    for (decimal, text) in FRACTIONS {
        if (value - decimal).abs() < 1e-9 {
            return text.to_string();
        }
    }
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn apply_derivation(
    derivation: &Derivation,
    attributes: &mut BTreeMap<String, AttrValue>,
    origin: SourceOrigin,
) -> Result<(), NormalizationError> {
    match derivation {
        Derivation::ChallengeRating { text, decimal } => {
            let text_value = attributes.get(*text).cloned().unwrap_or(AttrValue::Absent);
            let decimal_value = attributes.get(*decimal).cloned().unwrap_or(AttrValue::Absent);
            match (text_value, decimal_value) {
                (AttrValue::Text(t), AttrValue::Absent) => {
                    let parsed = parse_challenge_rating(&t).ok_or_else(|| {
                        NormalizationError::validation(text, "challenge rating", t.clone())
                    })?;
                    attributes.insert(decimal.to_string(), AttrValue::Float(parsed));
                }
                (AttrValue::Absent, AttrValue::Float(d)) => {
                    if d < 0.0 {
                        return Err(NormalizationError::validation(
                            decimal,
                            "non-negative float",
                            d.to_string(),
                        ));
                    }
                    attributes.insert(text.to_string(), AttrValue::Text(format_challenge_rating(d)));
                }
                (AttrValue::Absent, AttrValue::Absent) if !origin.is_lax() => {
                    return Err(NormalizationError::validation(
                        text,
                        "challenge rating",
                        "absent",
                    ));
                }
                _ => {}
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(value: serde_json::Value) -> RawRecord {
        RawRecord::from_json(value)
    }

    fn kw(s: &str) -> RawValue {
        RawValue::Keyword(s.to_string())
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fireball"), "fireball");
        assert_eq!(slugify("Melf's Acid Arrow"), "melf-s-acid-arrow");
        assert_eq!(slugify("Wall of Fire"), "wall-of-fire");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_secondary_spell() {
        let raw = api(json!({
            "slug": "fireball",
            "name": "Fireball",
            "desc": "A bright streak flashes...",
            "level": "3rd-level",
            "level_int": 3,
            "school": "Evocation",
            "concentration": "no",
            "ritual": "no",
            "dnd_class": "Sorcerer, Wizard",
            "document__slug": "wotc-srd",
            "document__title": "5e Core Rules",
        }));
        let e = normalize(&raw, SourceOrigin::ApiSecondary, EntityKind::Spell).unwrap();
        assert_eq!(e.identifier, "fireball");
        assert_eq!(e.attribute("level"), Some(&AttrValue::Int(3)));
        assert_eq!(e.attribute("school"), Some(&AttrValue::Text("evocation".into())));
        assert_eq!(e.attribute("concentration"), Some(&AttrValue::Bool(false)));
        assert_eq!(
            e.attribute("classes"),
            Some(&AttrValue::List(vec!["sorcerer".into(), "wizard".into()]))
        );
        assert_eq!(e.document.key.as_deref(), Some("wotc-srd"));
        assert_eq!(e.document.name.as_deref(), Some("5e Core Rules"));
        assert_eq!(e.document.source, "api-secondary");
        assert_eq!(e.payload["description"], json!("A bright streak flashes..."));
        assert!(!e.payload.contains_key("level_int"));
        assert!(!e.payload.contains_key("document__slug"));
        assert_eq!(e.payload["casting_time"], serde_json::Value::Null);
    }

    #[test]
    fn test_primary_spell_with_object_fields() {
        let raw = api(json!({
            "key": "srd_fireball",
            "name": "Fireball",
            "desc": ["Paragraph one.", "Paragraph two."],
            "level": 3,
            "school": {"name": "Evocation", "key": "evocation"},
            "concentration": false,
            "classes": [{"name": "Wizard", "key": "srd_wizard"}, {"name": "Sorcerer"}],
            "document": {"key": "srd-2014", "name": "System Reference Document 5.1"},
        }));
        let e = normalize(&raw, SourceOrigin::ApiPrimary, EntityKind::Spell).unwrap();
        assert_eq!(e.identifier, "srd_fireball");
        assert_eq!(e.attribute("school"), Some(&AttrValue::Text("evocation".into())));
        assert_eq!(
            e.attribute("classes"),
            Some(&AttrValue::List(vec!["wizard".into(), "sorcerer".into()]))
        );
        assert_eq!(e.payload["description"], json!("Paragraph one.\n\nParagraph two."));
        assert_eq!(e.document.key.as_deref(), Some("srd-2014"));
    }

    #[test]
    fn test_identifier_derived_from_name() {
        let raw = api(json!({"name": "Tasha's Hideous Laughter", "level": 1, "school": "Enchantment"}));
        let e = normalize(&raw, SourceOrigin::ApiPrimary, EntityKind::Spell).unwrap();
        assert_eq!(e.identifier, "tasha-s-hideous-laughter");
    }

    #[test]
    fn test_missing_identifier_and_name_fails() {
        let raw = api(json!({"level": 1}));
        let err = normalize(&raw, SourceOrigin::UserImport, EntityKind::Spell).unwrap_err();
        assert!(matches!(err, NormalizationError::IdentifierResolution(_)));
    }

    #[test]
    fn test_type_failure_reports_field() {
        let raw = api(json!({"slug": "x", "name": "X", "level": "high", "school": "evocation"}));
        let err = normalize(&raw, SourceOrigin::ApiSecondary, EntityKind::Spell).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::Validation {
                field: "level".into(),
                expected: "integer".into(),
                received: "\"high\"".into(),
            }
        );
    }

    #[test]
    fn test_required_attribute_strict_vs_lax() {
        let raw = api(json!({"name": "Mystery Spell"}));
        let err = normalize(&raw, SourceOrigin::ApiPrimary, EntityKind::Spell).unwrap_err();
        assert!(matches!(err, NormalizationError::Validation { ref field, .. } if field == "level"));

        let e = normalize(&raw, SourceOrigin::UserImport, EntityKind::Spell).unwrap();
        assert_eq!(e.attribute("level"), Some(&AttrValue::Absent));
        assert_eq!(e.attribute("school"), Some(&AttrValue::Absent));
        assert_eq!(e.payload["description"], serde_json::Value::Null);
    }

    #[test]
    fn test_orcbrew_spell() {
        let raw = RawRecord::with_container(
            RawValue::Map(vec![
                (kw("key"), kw("frost-lance")),
                (kw("name"), RawValue::Text("Frost Lance".into())),
                (kw("level"), RawValue::Int(2)),
                (kw("school"), RawValue::Text("evocation".into())),
                (
                    kw("spell-lists"),
                    RawValue::Map(vec![
                        (kw("wizard"), RawValue::Bool(true)),
                        (kw("bard"), RawValue::Bool(false)),
                    ]),
                ),
                (kw("option-pack"), RawValue::Text("Frozen North".into())),
            ]),
            "Frozen North",
        );
        let e = normalize(&raw, SourceOrigin::UserImport, EntityKind::Spell).unwrap();
        assert_eq!(e.identifier, "frost-lance");
        assert_eq!(e.attribute("classes"), Some(&AttrValue::List(vec!["wizard".into()])));
        assert_eq!(e.document.key.as_deref(), Some("frozen-north"));
        assert_eq!(e.document.name.as_deref(), Some("Frozen North"));
        assert_eq!(e.document.source, "user-import");
    }

    #[test]
    fn test_challenge_rating_derivations() {
        let from_text = api(json!({"slug": "goblin", "name": "Goblin", "type": "humanoid", "challenge_rating": "1/4"}));
        let e = normalize(&from_text, SourceOrigin::ApiSecondary, EntityKind::Creature).unwrap();
        assert_eq!(e.attribute("challenge_rating"), Some(&AttrValue::Text("1/4".into())));
        assert_eq!(e.attribute("challenge_rating_decimal"), Some(&AttrValue::Float(0.25)));

        let from_decimal = api(json!({"key": "ogre", "name": "Ogre", "type": {"name": "Giant"}, "challenge_rating_decimal": "2.000"}));
        let e = normalize(&from_decimal, SourceOrigin::ApiPrimary, EntityKind::Creature).unwrap();
        assert_eq!(e.attribute("challenge_rating"), Some(&AttrValue::Text("2".into())));
        assert_eq!(e.attribute("challenge_rating_decimal"), Some(&AttrValue::Float(2.0)));
        assert_eq!(e.attribute("creature_type"), Some(&AttrValue::Text("giant".into())));

        let numeric = RawRecord::new(RawValue::Map(vec![
            (kw("name"), RawValue::Text("Rat".into())),
            (kw("challenge"), RawValue::Float(0.125)),
        ]));
        let e = normalize(&numeric, SourceOrigin::UserImport, EntityKind::Creature).unwrap();
        assert_eq!(e.attribute("challenge_rating"), Some(&AttrValue::Text("1/8".into())));
        assert_eq!(e.attribute("challenge_rating_decimal"), Some(&AttrValue::Float(0.125)));
    }

    #[test]
    fn test_challenge_rating_required_for_api() {
        let raw = api(json!({"slug": "blob", "name": "Blob", "type": "ooze"}));
        let err = normalize(&raw, SourceOrigin::ApiSecondary, EntityKind::Creature).unwrap_err();
        assert!(matches!(err, NormalizationError::Validation { ref field, .. } if field == "challenge_rating"));
    }

    #[test]
    fn test_format_and_parse_challenge_rating() {
        assert_eq!(parse_challenge_rating("1/2"), Some(0.5));
        assert_eq!(parse_challenge_rating("10"), Some(10.0));
        assert_eq!(parse_challenge_rating("1/0"), None);
        assert_eq!(parse_challenge_rating("-1"), None);
        assert_eq!(format_challenge_rating(0.5), "1/2");
        assert_eq!(format_challenge_rating(17.0), "17");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raw = api(json!({
            "slug": "wand-of-fireballs",
            "name": "Wand of Fireballs",
            "type": "Wand",
            "rarity": "Rare",
            "requires_attunement": "requires attunement by a spellcaster",
            "desc": "This wand has 7 charges.",
            "document__slug": "wotc-srd",
            "extra": {"b": 2, "a": [1, 2]},
        }));
        let a = normalize(&raw, SourceOrigin::ApiSecondary, EntityKind::MagicItem).unwrap();
        let b = normalize(&raw, SourceOrigin::ApiSecondary, EntityKind::MagicItem).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.attribute("requires_attunement"), Some(&AttrValue::Bool(true)));
        assert_eq!(a.payload["extra"], json!({"a": [1, 2], "b": 2}));
    }

    #[test]
    fn test_non_mapping_record_is_structural_error() {
        let raw = RawRecord::new(RawValue::Vector(vec![RawValue::Int(1)]));
        let err = normalize(&raw, SourceOrigin::UserImport, EntityKind::Rule).unwrap_err();
        assert!(matches!(err, NormalizationError::StructuralParse(_)));
    }
}
