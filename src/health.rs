// HealthChecker: probes the embedder and vector-store capability traits
// (embedding::Embedder, storage::VectorStore) within a timeout and caches
// the composite verdict for a short window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::embedding::Embedder;
use crate::storage::VectorStore;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_TTL: Duration = Duration::from_secs(30);
const SENTINEL_COLLECTION: &str = "__health_sentinel__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyState {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub status: DependencyState,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: String,
    pub vector_store: DependencyHealth,
    pub embedding_engine: DependencyHealth,
}

struct Cached {
    status: HealthStatus,
    recorded_at: Instant,
}

pub struct HealthChecker {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    started_at: Instant,
    cache: Mutex<Option<Cached>>,
}

impl HealthChecker {
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            vector_store,
            started_at: Instant::now(),
            cache: Mutex::new(None),
        }
    }

    pub async fn check(&self) -> HealthStatus {
        if let Some(cached) = self.cache.lock().as_ref() {
            if cached.recorded_at.elapsed() < CACHE_TTL {
                return cached.status.clone();
            }
        }

        let embedding_engine = self.probe_embedder().await;
        let vector_store = self.probe_vector_store().await;

        let status = match (vector_store.status, embedding_engine.status) {
            (DependencyState::Up, DependencyState::Up) => OverallStatus::Healthy,
            (DependencyState::Down, DependencyState::Down) => OverallStatus::Unhealthy,
            _ => OverallStatus::Degraded,
        };

        let result = HealthStatus {
            status,
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vector_store,
            embedding_engine,
        };

        *self.cache.lock() = Some(Cached {
            status: result.clone(),
            recorded_at: Instant::now(),
        });

        result
    }

    async fn probe_embedder(&self) -> DependencyHealth {
        let started = Instant::now();
        match timeout(PROBE_TIMEOUT, self.embedder.embed("healthcheck")).await {
            Ok(Ok(_)) => DependencyHealth {
                status: DependencyState::Up,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(Err(e)) => DependencyHealth {
                status: DependencyState::Down,
                latency_ms: None,
                error: Some(e.to_string()),
            },
            Err(_) => DependencyHealth {
                status: DependencyState::Down,
                latency_ms: None,
                error: Some("embedder probe timed out".to_string()),
            },
        }
    }

    /// A "collection does not exist" error on the sentinel collection still
    /// means the backend is reachable, so it is classified `Up`.
    async fn probe_vector_store(&self) -> DependencyHealth {
        let started = Instant::now();
        match timeout(PROBE_TIMEOUT, self.vector_store.get_stats(SENTINEL_COLLECTION)).await {
            Ok(Ok(_)) => DependencyHealth {
                status: DependencyState::Up,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(Err(crate::error::IndexError::NotFound { .. })) => DependencyHealth {
                status: DependencyState::Up,
                latency_ms: Some(started.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(Err(e)) => DependencyHealth {
                status: DependencyState::Down,
                latency_ms: None,
                error: Some(e.to_string()),
            },
            Err(_) => DependencyHealth {
                status: DependencyState::Down,
                latency_ms: None,
                error: Some("vector-store probe timed out".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::storage::MemoryVectorStore;

    #[tokio::test]
    async fn healthy_when_both_dependencies_are_up() {
        let checker = HealthChecker::new(Arc::new(NullEmbedder::default()), Arc::new(MemoryVectorStore::new()));
        let status = checker.check().await;
        assert_eq!(status.status, OverallStatus::Healthy);
        assert_eq!(status.vector_store.status, DependencyState::Up);
    }

    #[tokio::test]
    async fn result_is_cached_within_ttl() {
        let checker = HealthChecker::new(Arc::new(NullEmbedder::default()), Arc::new(MemoryVectorStore::new()));
        let first = checker.check().await;
        let second = checker.check().await;
        assert_eq!(first.timestamp, second.timestamp);
    }
}
