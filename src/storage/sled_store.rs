// Persistent VectorStore backed by sled: one tree per collection, a
// brute-force cosine scan over its entries (sled has no ANN index either).
// Mirrors MemoryVectorStore's scoring but survives a process restart.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;

use crate::error::{backend_backoff, IndexError, Result, MAX_RETRIES};
use crate::model::{QueryResult, VectorEntry};

use super::{cosine_similarity, matches_filter, normalize_cosine, CollectionStats, MetadataFilter, VectorStore};

const DIM_KEY: &[u8] = b"__dimension__";

/// Opens (or creates) a sled database at `path`, retrying the open with
/// exponential backoff since the file can be transiently locked by another
/// process closing it down.
pub struct SledVectorStore {
    db: sled::Db,
}

impl SledVectorStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut backoff = backend_backoff(Duration::from_secs(5));
        let mut retries = 0u32;

        let db = loop {
            match sled::open(&path) {
                Ok(db) => break db,
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(IndexError::BackendUnavailable {
                            backend: "sled".to_string(),
                            message: e.to_string(),
                            source: Some(Box::new(e)),
                        });
                    }
                    match backoff.next_backoff() {
                        Some(delay) => {
                            retries += 1;
                            log::warn!("sled open failed at {}, retrying ({}/{}): {}", path.display(), retries, MAX_RETRIES, e);
                            std::thread::sleep(delay);
                        }
                        None => {
                            return Err(IndexError::BackendUnavailable {
                                backend: "sled".to_string(),
                                message: e.to_string(),
                                source: Some(Box::new(e)),
                            })
                        }
                    }
                }
            }
        };

        Ok(Self { db })
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree> {
        self.db.open_tree(collection).map_err(|e| IndexError::BackendUnavailable {
            backend: "sled".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })
    }

    fn dimension_of(tree: &sled::Tree) -> Option<usize> {
        tree.get(DIM_KEY)
            .ok()
            .flatten()
            .and_then(|bytes| bincode::deserialize::<usize>(&bytes).ok())
    }
}

#[async_trait]
impl VectorStore for SledVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| IndexError::BackendUnavailable {
            backend: "sled".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let tree = self.tree(name)?;
        if Self::dimension_of(&tree).is_some() {
            return Err(IndexError::InvalidParams {
                message: format!("collection '{}' already exists", name),
            });
        }
        tree.insert(DIM_KEY, bincode::serialize(&dim).unwrap())
            .map_err(|e| IndexError::BackendUnavailable {
                backend: "sled".to_string(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.db.drop_tree(name).map_err(|e| IndexError::BackendUnavailable {
            backend: "sled".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, vectors: Vec<VectorEntry>) -> Result<()> {
        let tree = self.tree(collection)?;
        let dim = Self::dimension_of(&tree).ok_or_else(|| IndexError::NotFound {
            resource: format!("collection '{}'", collection),
        })?;

        let mut batch = sled::Batch::default();
        for entry in vectors {
            if entry.vector.len() != dim {
                return Err(IndexError::InvalidParams {
                    message: format!(
                        "vector dimension {} does not match collection dimension {}",
                        entry.vector.len(),
                        dim
                    ),
                });
            }
            let bytes = bincode::serialize(&entry).map_err(|e| IndexError::Internal {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
            batch.insert(entry.id.as_bytes(), bytes);
        }
        tree.apply_batch(batch).map_err(|e| IndexError::BackendUnavailable {
            backend: "sled".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let tree = self.tree(collection)?;
        if Self::dimension_of(&tree).is_none() {
            return Err(IndexError::NotFound {
                resource: format!("collection '{}'", collection),
            });
        }

        let mut scored = Vec::new();
        for item in tree.iter() {
            let (key, bytes) = item.map_err(|e| IndexError::BackendUnavailable {
                backend: "sled".to_string(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;
            if key.as_ref() == DIM_KEY {
                continue;
            }
            let entry: VectorEntry = match bincode::deserialize(&bytes) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("skipping corrupt entry in collection '{}': {}", collection, e);
                    continue;
                }
            };
            if !matches_filter(&entry.metadata, filter) {
                continue;
            }
            scored.push(QueryResult {
                id: entry.id,
                score: normalize_cosine(cosine_similarity(vector, &entry.vector)),
                metadata: entry.metadata,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let tree = self.tree(collection)?;
        let mut batch = sled::Batch::default();
        for id in ids {
            batch.remove(id.as_bytes());
        }
        tree.apply_batch(batch).map_err(|e| IndexError::BackendUnavailable {
            backend: "sled".to_string(),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    async fn get_stats(&self, collection: &str) -> Result<CollectionStats> {
        let tree = self.tree(collection)?;
        let dim = Self::dimension_of(&tree).ok_or_else(|| IndexError::NotFound {
            resource: format!("collection '{}'", collection),
        })?;
        let vector_count = tree.len().saturating_sub(1);
        Ok(CollectionStats {
            vector_count,
            dimension: dim,
            index_size: self.db.size_on_disk().unwrap_or(0) as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            vector,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_and_query_round_trips_through_disk() {
        let tmp = TempDir::new().unwrap();
        let store = SledVectorStore::open(tmp.path().join("db")).unwrap();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert("c", vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store.query("c", &[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].id, "a");

        let stats = store.get_stats("c").await.unwrap();
        assert_eq!(stats.vector_count, 2);
    }

    #[tokio::test]
    async fn create_collection_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let store = SledVectorStore::open(tmp.path().join("db")).unwrap();
        store.create_collection("c", 2).await.unwrap();
        assert!(store.create_collection("c", 2).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let tmp = TempDir::new().unwrap();
        let store = SledVectorStore::open(tmp.path().join("db")).unwrap();
        store.create_collection("c", 1).await.unwrap();
        store.upsert("c", vec![entry("a", vec![1.0])]).await.unwrap();
        store.delete("c", &["a".to_string()]).await.unwrap();
        let stats = store.get_stats("c").await.unwrap();
        assert_eq!(stats.vector_count, 0);
    }
}
