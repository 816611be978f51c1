// HybridSearchEngine: linear fusion of BM25 and vector-similarity scores,
// each already normalized into [0, 1] before weighting.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::QueryResult;
use crate::search::bm25::{self, BM25Index};
use crate::storage::{MetadataFilter, VectorStore};

#[derive(Debug, Clone, Copy)]
pub struct SearchWeights {
    pub bm25: f32,
    pub vector: f32,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self { bm25: 0.3, vector: 0.7 }
    }
}

impl SearchWeights {
    pub fn validate(&self) -> bool {
        (self.bm25 + self.vector - 1.0).abs() <= 1e-6
    }
}

pub struct HybridSearchEngine {
    vector_store: Arc<dyn VectorStore>,
    weights: SearchWeights,
}

impl HybridSearchEngine {
    pub fn new(vector_store: Arc<dyn VectorStore>, weights: SearchWeights) -> Self {
        Self { vector_store, weights }
    }

    /// Runs both legs, unions by id, fuses with `self.weights`, and returns
    /// the top `top_k` results descending. An empty query yields an empty
    /// result list; a failed leg degrades to the surviving leg's
    /// results rather than failing the whole query.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        query_vector: &[f32],
        bm25_index: &BM25Index,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<QueryResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let widened = top_k.saturating_mul(2).max(top_k);
        let tokens = bm25::tokenize(query);

        let bm25_matches = bm25_index.query(collection, &tokens, widened);

        let vector_matches = self
            .vector_store
            .query(collection, query_vector, widened, filter)
            .await
            .unwrap_or_default();

        let mut combined: HashMap<String, (f32, f32, HashMap<String, serde_json::Value>)> = HashMap::new();
        for m in bm25_matches {
            combined.entry(m.doc_id).or_insert((0.0, 0.0, HashMap::new())).0 = m.score;
        }
        for m in vector_matches {
            let entry = combined.entry(m.id).or_insert((0.0, 0.0, HashMap::new()));
            entry.1 = m.score;
            entry.2 = m.metadata;
        }

        let mut fused: Vec<QueryResult> = combined
            .into_iter()
            .filter(|(_, (bm25_score, vector_score, _))| *bm25_score > 0.0 || *vector_score > 0.0)
            .map(|(id, (bm25_score, vector_score, metadata))| QueryResult {
                id,
                score: self.weights.bm25 * bm25_score + self.weights.vector * vector_score,
                metadata,
            })
            .filter(|result| crate::storage::matches_filter(&result.metadata, filter))
            .collect();

        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VectorEntry;
    use crate::storage::MemoryVectorStore;

    async fn seeded_store() -> Arc<dyn VectorStore> {
        let store = MemoryVectorStore::new();
        store.create_collection("proj", 2).await.unwrap();
        store
            .upsert(
                "proj",
                vec![
                    VectorEntry { id: "a".into(), vector: vec![1.0, 0.0], metadata: HashMap::new() },
                    VectorEntry { id: "b".into(), vector: vec![0.2, 0.98], metadata: HashMap::new() },
                ],
            )
            .await
            .unwrap();
        Arc::new(store)
    }

    /// Builds a collection where "a" is the strong BM25 match but the
    /// weakest vector match (its vector points opposite the query), and "b"
    /// is the reverse: a weak BM25 match but a perfect vector match.
    async fn weight_swap_fixture() -> (Arc<dyn VectorStore>, BM25Index) {
        let store = MemoryVectorStore::new();
        store.create_collection("proj", 2).await.unwrap();
        store
            .upsert(
                "proj",
                vec![
                    VectorEntry { id: "a".into(), vector: vec![-1.0, 0.0], metadata: HashMap::new() },
                    VectorEntry { id: "b".into(), vector: vec![1.0, 0.0], metadata: HashMap::new() },
                ],
            )
            .await
            .unwrap();

        let mut bm25 = BM25Index::new();
        bm25.upsert("proj", "a", &vec!["fox".to_string(); 6]);
        let mut b_tokens = vec!["filler".to_string(); 20];
        b_tokens.push("fox".to_string());
        bm25.upsert("proj", "b", &b_tokens);

        (Arc::new(store), bm25)
    }

    #[tokio::test]
    async fn swapping_weights_swaps_ranking() {
        let (store, bm25) = weight_swap_fixture().await;
        let query_vector = [1.0, 0.0];

        let vector_heavy = HybridSearchEngine::new(store.clone(), SearchWeights { bm25: 0.3, vector: 0.7 });
        let vector_heavy_results = vector_heavy.search("proj", "fox", &query_vector, &bm25, 2, None).await;
        assert_eq!(vector_heavy_results[0].id, "b", "vector-heavy weights should rank the vector match first");

        let bm25_heavy = HybridSearchEngine::new(store, SearchWeights { bm25: 0.7, vector: 0.3 });
        let bm25_heavy_results = bm25_heavy.search("proj", "fox", &query_vector, &bm25, 2, None).await;
        assert_eq!(bm25_heavy_results[0].id, "a", "bm25-heavy weights should rank the BM25 match first");
    }

    #[tokio::test]
    async fn empty_query_returns_empty_results() {
        let store = seeded_store().await;
        let engine = HybridSearchEngine::new(store, SearchWeights::default());
        let bm25 = BM25Index::new();
        let results = engine.search("proj", "", &[1.0, 0.0], &bm25, 10, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn vector_only_leg_still_returns_results_when_bm25_is_empty() {
        let store = seeded_store().await;
        let engine = HybridSearchEngine::new(store, SearchWeights::default());
        let bm25 = BM25Index::new();
        let results = engine.search("proj", "the and", &[1.0, 0.0], &bm25, 10, None).await;
        assert!(!results.is_empty());
    }
}
