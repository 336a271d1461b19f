//! Document discovery.
//!
//! Asks each kind's store for its distinct documents, merges them by
//! `(document_key, document_source)`, and attaches publisher/license
//! enrichment where the side table has it. Entities without a document key
//! are not listed.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use crate::models::{DocumentCount, DocumentMetadata, DocumentSummary, EntityKind};
use crate::store::EntityStore;

/// Every cached document, ordered by key then source. Empty when nothing is cached.
pub async fn list_documents(store: &dyn EntityStore) -> Result<Vec<DocumentSummary>> {
    let mut counts = Vec::new();
    for kind in EntityKind::ALL {
        for count in store.document_counts(kind).await? {
            counts.push((kind, count));
        }
    }
    let metadata = store.document_metadata().await?;
    let summaries = merge_document_counts(counts, &metadata);
    debug!(documents = summaries.len(), "listed documents");
    Ok(summaries)
}

/// Merge per-kind counts into one summary per `(document_key, document_source)`.
///
/// The first non-empty document name seen for a pair wins.
pub fn merge_document_counts(
    counts: impl IntoIterator<Item = (EntityKind, DocumentCount)>,
    metadata: &[DocumentMetadata],
) -> Vec<DocumentSummary> {
    let mut merged: BTreeMap<(String, String), DocumentSummary> = BTreeMap::new();

    for (kind, count) in counts {
        let summary = merged
            .entry((count.document_key.clone(), count.document_source.clone()))
            .or_insert_with(|| DocumentSummary {
                document_key: count.document_key.clone(),
                document_name: None,
                source: count.document_source.clone(),
                entity_count: 0,
                entity_kind_counts: BTreeMap::new(),
                publisher: None,
                license: None,
                game_system: None,
            });
        if summary.document_name.is_none() {
            summary.document_name = count.document_name.filter(|n| !n.is_empty());
        }
        summary.entity_count += count.count;
        *summary.entity_kind_counts.entry(kind).or_insert(0) += count.count;
    }

    for meta in metadata {
        if let Some(summary) =
            merged.get_mut(&(meta.document_key.clone(), meta.document_source.clone()))
        {
            summary.publisher = meta.publisher.clone();
            summary.license = meta.license.clone();
            summary.game_system = meta.game_system.clone();
        }
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRef, Entity, SourceOrigin};
    use crate::store::memory::InMemoryStore;

    fn count(key: &str, name: Option<&str>, source: &str, n: i64) -> DocumentCount {
        DocumentCount {
            document_key: key.into(),
            document_name: name.map(str::to_string),
            document_source: source.into(),
            count: n,
        }
    }

    fn entity(kind: EntityKind, id: &str, doc: Option<&str>, source: SourceOrigin) -> Entity {
        Entity {
            identifier: id.into(),
            name: id.into(),
            kind,
            source_origin: source,
            document: DocumentRef {
                key: doc.map(str::to_string),
                name: doc.map(|d| d.to_uppercase()),
                source: source.as_str().into(),
            },
            attributes: BTreeMap::new(),
            payload: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_merge_sums_kinds() {
        let merged = merge_document_counts(
            vec![
                (EntityKind::Spell, count("srd", None, "api-primary", 3)),
                (EntityKind::Creature, count("srd", Some("SRD 5.1"), "api-primary", 4)),
                (EntityKind::Spell, count("srd", Some("SRD"), "api-secondary", 1)),
            ],
            &[DocumentMetadata {
                document_key: "srd".into(),
                document_source: "api-primary".into(),
                publisher: Some("Wizards of the Coast".into()),
                license: Some("CC-BY-4.0".into()),
                game_system: None,
            }],
        );
        assert_eq!(merged.len(), 2);
        let primary = &merged[0];
        assert_eq!(primary.source, "api-primary");
        assert_eq!(primary.entity_count, 7);
        assert_eq!(primary.document_name.as_deref(), Some("SRD 5.1"));
        assert_eq!(primary.entity_kind_counts[&EntityKind::Creature], 4);
        assert_eq!(primary.publisher.as_deref(), Some("Wizards of the Coast"));
        assert_eq!(merged[1].publisher, None);
    }

    #[tokio::test]
    async fn test_list_documents_from_store() {
        let store = InMemoryStore::new();
        store
            .upsert_batch(&[
                entity(EntityKind::Spell, "a", Some("tce"), SourceOrigin::ApiPrimary),
                entity(EntityKind::Spell, "b", Some("tce"), SourceOrigin::ApiPrimary),
                entity(EntityKind::Feat, "c", Some("tce"), SourceOrigin::ApiPrimary),
                entity(EntityKind::Feat, "d", Some("homebrew"), SourceOrigin::UserImport),
                entity(EntityKind::Rule, "e", None, SourceOrigin::ApiSecondary),
            ])
            .await
            .unwrap();
        let docs = list_documents(&store).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document_key, "homebrew");
        assert_eq!(docs[1].document_key, "tce");
        assert_eq!(docs[1].entity_count, 3);
        assert_eq!(docs[1].entity_kind_counts.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_documents() {
        let store = InMemoryStore::new();
        assert!(list_documents(&store).await.unwrap().is_empty());
    }
}
