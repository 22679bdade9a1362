//! JSON-file document store.
//!
//! The whole collection lives in one JSON object keyed by document id. It is
//! read once on open and rewritten (temp file + rename) after every put. A
//! put whose write fails is rolled back in memory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::memory::apply_put;
use super::{DocumentStore, StoreResult};
use crate::document::Document;
use crate::error::StoreError;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    docs: Mutex<BTreeMap<String, Document>>,
}

impl FileStore {
    /// Open the collection at `path`. A missing file is an empty collection.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let docs = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str::<BTreeMap<String, Document>>(&contents)
                .map_err(|e| {
                    StoreError::Unavailable(format!("{}: {e}", path.display()))
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StoreError::Unavailable(format!("{}: {e}", path.display())));
            }
        };
        tracing::debug!(path = %path.display(), docs = docs.len(), "opened document file");
        Ok(Self {
            path,
            docs: Mutex::new(docs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, docs: &BTreeMap<String, Document>) -> StoreResult<()> {
        let unavailable = |e: std::io::Error| {
            StoreError::Unavailable(format!("{}: {e}", self.path.display()))
        };
        let body = serde_json::to_vec_pretty(docs)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(unavailable)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, id: &str) -> StoreResult<Document> {
        let docs = self.docs.lock().await;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn put(&self, doc: Document) -> StoreResult<String> {
        let mut docs = self.docs.lock().await;
        let id = doc.id().ok_or(StoreError::MissingId)?.to_string();
        let prior = docs.get(&id).cloned();
        let rev = apply_put(&mut docs, doc)?;

        if let Err(e) = self.flush(&docs).await {
            // keep memory in step with the file
            match prior {
                Some(prior) => docs.insert(id, prior),
                None => docs.remove(&id),
            };
            return Err(e);
        }
        Ok(rev)
    }

    async fn all_docs(&self) -> StoreResult<Vec<Document>> {
        let docs = self.docs.lock().await;
        Ok(docs.values().cloned().collect())
    }
}
