//! In-memory document store for development and testing

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreResult, next_rev};
use crate::document::Document;
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, assigning revisions. Documents without `_id` are ignored.
    #[cfg(test)]
    pub fn with_docs(docs: impl IntoIterator<Item = Document>) -> Self {
        let map = docs
            .into_iter()
            .filter_map(|mut doc| {
                let id = doc.id()?.to_string();
                if doc.rev().is_none() {
                    doc.set_rev(&next_rev(None));
                }
                Some((id, doc))
            })
            .collect();
        Self {
            docs: RwLock::new(map),
        }
    }
}

/// Revision check plus write, shared with the file-backed store.
pub(super) fn apply_put(
    docs: &mut BTreeMap<String, Document>,
    mut doc: Document,
) -> StoreResult<String> {
    let id = doc.id().ok_or(StoreError::MissingId)?.to_string();
    let stored_rev = docs.get(&id).and_then(|d| d.rev()).map(str::to_string);
    let given_rev = doc.rev().map(str::to_string);

    if stored_rev != given_rev {
        return Err(StoreError::Conflict {
            id,
            expected: given_rev,
            found: stored_rev,
        });
    }

    let rev = next_rev(stored_rev.as_deref());
    doc.set_rev(&rev);
    docs.insert(id, doc);
    Ok(rev)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Document> {
        let docs = self.docs.read().await;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn put(&self, doc: Document) -> StoreResult<String> {
        let mut docs = self.docs.write().await;
        apply_put(&mut docs, doc)
    }

    async fn all_docs(&self) -> StoreResult<Vec<Document>> {
        let docs = self.docs.read().await;
        Ok(docs.values().cloned().collect())
    }
}
