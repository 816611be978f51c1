pub mod bm25;
pub mod hybrid;

pub use bm25::{BM25Engine, BM25Index, BM25Match};
pub use hybrid::{HybridSearchEngine, SearchWeights};
