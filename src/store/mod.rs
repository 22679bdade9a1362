//! Document store boundary.
//!
//! The engine only needs get/put by id and a way to enumerate the collection
//! each tick. Writes are revision-checked: a document whose `_rev` no longer
//! matches the stored one is rejected with [`StoreError::Conflict`].

mod file;
mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::document::Document;
use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the current revision of a document.
    async fn get(&self, id: &str) -> StoreResult<Document>;

    /// Save a document, returning its new revision.
    async fn put(&self, doc: Document) -> StoreResult<String>;

    /// Every document in the collection, in id order.
    async fn all_docs(&self) -> StoreResult<Vec<Document>>;
}

/// `store_path` value selecting a throwaway in-memory collection.
pub const MEMORY_STORE_PATH: &str = ":memory:";

/// Open the store configured by `store_path`.
pub async fn open(path: &Path) -> StoreResult<Arc<dyn DocumentStore>> {
    if path == Path::new(MEMORY_STORE_PATH) {
        tracing::info!("using in-memory document store, nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = FileStore::open(path).await?;
    tracing::info!(path = %store.path().display(), "document store opened");
    Ok(Arc::new(store))
}

/// Next revision string in `<generation>-<suffix>` form.
pub(crate) fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_path_opens_an_empty_memory_store() {
        let store = open(Path::new(MEMORY_STORE_PATH)).await.unwrap();
        assert!(store.all_docs().await.unwrap().is_empty());

        let mut doc = Document::default();
        doc.insert("_id", serde_json::json!("p1"));
        let rev = store.put(doc).await.unwrap();
        assert_eq!(store.get("p1").await.unwrap().rev(), Some(rev.as_str()));
        assert!(!Path::new(MEMORY_STORE_PATH).exists());
    }

    #[tokio::test]
    async fn other_paths_open_a_file_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docs.json");
        let store = open(&path).await.unwrap();

        let mut doc = Document::default();
        doc.insert("_id", serde_json::json!("p1"));
        store.put(doc).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn next_rev_increments_generation() {
        assert!(next_rev(None).starts_with("1-"));
        assert!(next_rev(Some("1-abc")).starts_with("2-"));
        assert!(next_rev(Some("41-abc")).starts_with("42-"));
        assert!(next_rev(Some("garbage")).starts_with("1-"));
    }
}
