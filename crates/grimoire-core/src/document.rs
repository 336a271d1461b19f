//! Document metadata extraction.
//!
//! Every entity carries a provenance triple `(key, name, source)`. The
//! source is always the origin tag; key and name come from wherever the
//! origin keeps its book reference:
//!
//! | Origin | Key | Name |
//! |--------|-----|------|
//! | `api-primary` | `document.key` (or the last segment of a document URL) | `document.name` |
//! | `api-secondary` | `document__slug` | `document__title` |
//! | `user-import` | slug of the name | enclosing container, else `option_pack` |
//!
//! Either API shape is accepted from either API origin. Extraction never
//! fails: missing information yields `None`.

use crate::coerce::Data;
use crate::models::{DocumentRef, SourceOrigin};
use crate::normalize::{slugify, Record};

/// Source fields read here; the normalizer keeps them out of the payload.
pub const DOCUMENT_FIELDS: &[&str] = &[
    "document",
    "document__slug",
    "document__title",
    "document__url",
    "document_key",
    "document_name",
    "option_pack",
];

pub fn extract_document(record: &Record, origin: SourceOrigin) -> DocumentRef {
    let (key, name) = match origin {
        SourceOrigin::UserImport => from_container(record),
        SourceOrigin::ApiPrimary | SourceOrigin::ApiSecondary => from_api(record),
    };
    DocumentRef {
        key,
        name,
        source: origin.as_str().to_string(),
    }
}

fn from_container(record: &Record) -> (Option<String>, Option<String>) {
    let name = record
        .container
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| record.text(&["option_pack"]))
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let key = name
        .as_deref()
        .map(slugify)
        .filter(|slug| !slug.is_empty());
    (key, name)
}

fn from_api(record: &Record) -> (Option<String>, Option<String>) {
    let (mut key, mut name) = match record.fields.get("document") {
        Some(Data::Map(doc)) => (
            first_text(doc.get("key").or_else(|| doc.get("slug"))),
            first_text(doc.get("name").or_else(|| doc.get("title"))),
        ),
        Some(Data::Text(reference)) => (url_segment(reference), None),
        _ => (None, None),
    };

    if key.is_none() {
        key = record
            .text(&["document__slug", "document_key"])
            .map(str::to_string)
            .or_else(|| record.text(&["document__url"]).and_then(url_segment));
    }
    if name.is_none() {
        name = record
            .text(&["document__title", "document_name"])
            .map(str::to_string);
    }
    (key, name)
}

fn first_text(data: Option<&Data>) -> Option<String> {
    data.and_then(Data::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `https://api.example/v2/documents/srd-2014/` → `srd-2014`; a bare key passes through.
fn url_segment(reference: &str) -> Option<String> {
    reference
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
