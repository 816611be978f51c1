// In-process brute-force VectorStore: no ANN structure, just a linear
// scan scored by cosine similarity. Serves as the default local backend and
// the one used by tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::{IndexError, Result};
use crate::model::{QueryResult, VectorEntry};

use super::{cosine_similarity, matches_filter, normalize_cosine, CollectionStats, MetadataFilter, VectorStore};

#[derive(Default)]
struct Collection {
    dimension: usize,
    entries: HashMap<String, VectorEntry>,
}

/// `connect`/`disconnect` are no-ops; nothing here survives a restart. See
/// `SledVectorStore` for the persistent counterpart.
pub struct MemoryVectorStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(IndexError::InvalidParams {
                message: format!("collection '{}' already exists", name),
            });
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimension: dim,
                entries: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, vectors: Vec<VectorEntry>) -> Result<()> {
        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| IndexError::NotFound {
                resource: format!("collection '{}'", collection),
            })?;
        for vector in vectors {
            if vector.vector.len() != entry.dimension {
                return Err(IndexError::InvalidParams {
                    message: format!(
                        "vector dimension {} does not match collection dimension {}",
                        vector.vector.len(),
                        entry.dimension
                    ),
                });
            }
            entry.entries.insert(vector.id.clone(), vector);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| IndexError::NotFound {
                resource: format!("collection '{}'", collection),
            })?;

        // Brute-force scan, parallelized with rayon since there is no ANN
        // index to narrow the candidate set first.
        let mut scored: Vec<QueryResult> = entry
            .entries
            .par_iter()
            .filter(|(_, v)| matches_filter(&v.metadata, filter))
            .map(|(_, v)| QueryResult {
                id: v.id.clone(),
                score: normalize_cosine(cosine_similarity(vector, &v.vector)),
                metadata: v.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        if let Some(entry) = self.collections.write().get_mut(collection) {
            for id in ids {
                entry.entries.remove(id);
            }
        }
        Ok(())
    }

    async fn get_stats(&self, collection: &str) -> Result<CollectionStats> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| IndexError::NotFound {
                resource: format!("collection '{}'", collection),
            })?;
        Ok(CollectionStats {
            vector_count: entry.entries.len(),
            dimension: entry.dimension,
            index_size: entry.entries.len() * entry.dimension * std::mem::size_of::<f32>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            id: id.to_string(),
            vector,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn query_returns_exact_match_with_top_score() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 3).await.unwrap();
        store
            .upsert("c", vec![entry("a", vec![1.0, 0.0, 0.0]), entry("b", vec![0.0, 1.0, 0.0])])
            .await
            .unwrap();
        let results = store.query("c", &[1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn upsert_replaces_prior_vector_with_same_id() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        store.upsert("c", vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        store.upsert("c", vec![entry("a", vec![0.0, 1.0])]).await.unwrap();
        let stats = store.get_stats("c").await.unwrap();
        assert_eq!(stats.vector_count, 1);
    }

    #[tokio::test]
    async fn create_collection_twice_fails() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 2).await.unwrap();
        assert!(store.create_collection("c", 2).await.is_err());
    }

    #[tokio::test]
    async fn query_respects_top_k() {
        let store = MemoryVectorStore::new();
        store.create_collection("c", 1).await.unwrap();
        store
            .upsert(
                "c",
                vec![entry("a", vec![1.0]), entry("b", vec![0.5]), entry("c", vec![0.1])],
            )
            .await
            .unwrap();
        let results = store.query("c", &[1.0], 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
