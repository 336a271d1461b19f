//! In-memory [`EntityStore`] implementation for tests and embedding.
//!
//! All kinds live behind one `std::sync::RwLock`, so a batch is applied
//! under a single write guard and readers see either none or all of it.
//! Queries evaluate [`Predicate::matches`](super::Predicate::matches)
//! directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{DocumentCount, DocumentMetadata, Entity, EntityKind};

use super::{column_value, EntityStore, StoreQuery};

#[derive(Default)]
struct State {
    entities: HashMap<EntityKind, BTreeMap<String, Entity>>,
    metadata: BTreeMap<(String, String), DocumentMetadata>,
}

/// In-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn upsert_batch(&self, entities: &[Entity]) -> Result<usize> {
        let mut state = self.write()?;
        for entity in entities {
            state
                .entities
                .entry(entity.kind)
                .or_default()
                .insert(entity.identifier.clone(), entity.clone());
        }
        Ok(entities.len())
    }

    async fn get(&self, kind: EntityKind, identifier: &str) -> Result<Option<Entity>> {
        let state = self.read()?;
        Ok(state
            .entities
            .get(&kind)
            .and_then(|by_id| by_id.get(identifier))
            .cloned())
    }

    async fn query(&self, query: &StoreQuery) -> Result<Vec<Entity>> {
        let state = self.read()?;
        let Some(by_id) = state.entities.get(&query.kind) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<&Entity> = by_id
            .values()
            .filter(|e| {
                query
                    .conditions
                    .iter()
                    .all(|c| c.predicate.matches(&column_value(e, &c.column)))
            })
            .collect();
        hits.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);
        Ok(hits.into_iter().take(limit).cloned().collect())
    }

    async fn document_counts(&self, kind: EntityKind) -> Result<Vec<DocumentCount>> {
        let state = self.read()?;
        let mut counts: BTreeMap<(String, Option<String>, String), i64> = BTreeMap::new();
        for entity in state.entities.get(&kind).into_iter().flat_map(|m| m.values()) {
            let Some(key) = entity.document.key.clone() else {
                continue;
            };
            *counts
                .entry((key, entity.document.name.clone(), entity.document.source.clone()))
                .or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((document_key, document_name, document_source), count)| DocumentCount {
                document_key,
                document_name,
                document_source,
                count,
            })
            .collect())
    }

    async fn document_metadata(&self) -> Result<Vec<DocumentMetadata>> {
        let state = self.read()?;
        Ok(state.metadata.values().cloned().collect())
    }

    async fn upsert_document_metadata(&self, metadata: &DocumentMetadata) -> Result<()> {
        let mut state = self.write()?;
        state.metadata.insert(
            (
                metadata.document_key.clone(),
                metadata.document_source.clone(),
            ),
            metadata.clone(),
        );
        Ok(())
    }

    async fn purge(&self, kind: EntityKind) -> Result<u64> {
        let mut state = self.write()?;
        Ok(state
            .entities
            .remove(&kind)
            .map(|by_id| by_id.len() as u64)
            .unwrap_or(0))
    }

    async fn count(&self, kind: EntityKind) -> Result<i64> {
        let state = self.read()?;
        Ok(state.entities.get(&kind).map_or(0, |m| m.len() as i64))
    }
}
