//! Normalize-then-store pipeline.
//!
//! A record that fails normalization is skipped and reported; the rest of
//! the batch is still written. Store failures abort the call.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{IngestError, NormalizationError};
use crate::models::{EntityKind, SourceOrigin};
use crate::normalize::{normalize, RawRecord, Record};
use crate::schema::alias_table;
use crate::store::EntityStore;

/// A record that was not ingested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    /// Position in the input batch.
    pub index: usize,
    /// Identifier or name, when the record got far enough to have one.
    pub identifier_hint: Option<String>,
    #[serde(serialize_with = "serialize_error")]
    pub error: NormalizationError,
}

fn serialize_error<S: serde::Serializer>(
    error: &NormalizationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of [`ingest_batch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub kind: EntityKind,
    pub origin: SourceOrigin,
    pub imported: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Normalize one record and upsert it. Returns the entity identifier.
pub async fn normalize_and_store(
    store: &dyn EntityStore,
    raw: &RawRecord,
    origin: SourceOrigin,
    kind: EntityKind,
) -> Result<String, IngestError> {
    let entity = normalize(raw, origin, kind)?;
    store.upsert(&entity).await.map_err(IngestError::Store)?;
    Ok(entity.identifier)
}

/// Normalize every record and write the successes as one atomic batch.
pub async fn ingest_batch(
    store: &dyn EntityStore,
    records: &[RawRecord],
    origin: SourceOrigin,
    kind: EntityKind,
) -> anyhow::Result<IngestReport> {
    let mut entities = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (index, raw) in records.iter().enumerate() {
        match normalize(raw, origin, kind) {
            Ok(entity) => entities.push(entity),
            Err(error) => {
                let identifier_hint = identifier_hint(raw, kind);
                warn!(
                    %kind,
                    %origin,
                    index,
                    record = identifier_hint.as_deref().unwrap_or("?"),
                    %error,
                    "skipping record"
                );
                skipped.push(SkippedRecord {
                    index,
                    identifier_hint,
                    error,
                });
            }
        }
    }

    let imported = if entities.is_empty() {
        0
    } else {
        store.upsert_batch(&entities).await?
    };
    info!(%kind, %origin, imported, skipped = skipped.len(), "ingested batch");

    Ok(IngestReport {
        kind,
        origin,
        imported,
        skipped,
    })
}

fn identifier_hint(raw: &RawRecord, kind: EntityKind) -> Option<String> {
    let record = Record::from_raw(raw).ok()?;
    let table = alias_table(kind);
    record
        .text(table.identifier)
        .or_else(|| record.text(table.name))
        .map(str::to_string)
}
