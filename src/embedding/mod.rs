// Embedder capability: a polymorphic trait over embedding backends.
// Concrete model backends (GGUF/candle pipelines, hosted APIs, ...) are
// external collaborators selected from configuration, out of scope here.

pub mod cache;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

pub use cache::{CacheStats, CachingEmbedder};

/// Produces fixed-dimension embeddings for text chunks. Implementations
/// differ in dimensionality and latency; `embed` must return a vector of
/// exactly `dimension()` length, and repeated calls on identical text must
/// return vectors whose cosine distance is below an implementation-defined
/// epsilon.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn dispose(&self) -> Result<()>;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// Deterministic hash-based embedder: the one reference implementation this
/// crate ships, used by tests and as the local/offline default. Derives a
/// full vector from repeated SHA256 hashing of the input text.
pub struct NullEmbedder {
    dimension: usize,
}

impl NullEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for NullEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for NullEmbedder {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut seed = Sha256::digest(text.as_bytes()).to_vec();
        while vector.len() < self.dimension {
            for byte in &seed {
                if vector.len() >= self.dimension {
                    break;
                }
                // Map each byte into [-1, 1] so cosine similarity behaves
                // sensibly in tests that exercise the hybrid ranker.
                vector.push((*byte as f32 / 255.0) * 2.0 - 1.0);
            }
            seed = Sha256::digest(&seed).to_vec();
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_stable_vector() {
        let embedder = NullEmbedder::new(16);
        let a = embedder.embed("hello world").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let embedder = NullEmbedder::new(16);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }
}
