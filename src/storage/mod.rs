// VectorStore capability: one trait covering collection management,
// upsert, k-nearest-neighbor query, delete, and stats, so concrete backends
// (sled, LanceDB, Milvus, Qdrant, ...) are interchangeable.

pub mod memory_store;
pub mod sled_store;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{QueryResult, VectorEntry};

pub use memory_store::MemoryVectorStore;
pub use sled_store::SledVectorStore;

#[derive(Debug, Clone, Default)]
pub struct MetadataFilter(pub HashMap<String, serde_json::Value>);

#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub index_size: usize,
}

/// Persists vectors with metadata and serves k-nearest-neighbor queries.
/// Concrete backends (Milvus, Zilliz, Chroma, Qdrant, ...) are external
/// collaborators; this crate ships two reference implementations,
/// `MemoryVectorStore` (in-process, volatile) and `SledVectorStore`
/// (on-disk, persistent across restarts).
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn create_collection(&self, name: &str, dim: usize) -> Result<()>;
    async fn delete_collection(&self, name: &str) -> Result<()>;
    async fn upsert(&self, collection: &str, vectors: Vec<VectorEntry>) -> Result<()>;
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<QueryResult>>;
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;
    async fn get_stats(&self, collection: &str) -> Result<CollectionStats>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rescales cosine similarity from `[-1, 1]` into `[0, 1]` so it composes
/// with BM25's `[0, 1]` score range in the hybrid ranker (open question:
/// L2-distance adapters must clamp similarly).
pub fn normalize_cosine(similarity: f32) -> f32 {
    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}

pub fn matches_filter(metadata: &HashMap<String, serde_json::Value>, filter: Option<&MetadataFilter>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    filter.0.iter().all(|(key, value)| metadata.get(key) == Some(value))
}
