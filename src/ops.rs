// Tool surface: request/response shapes for the five
// operations a host transport exposes to an assistant, plus the progress
// notification shape. The JSON-RPC/stdio loop itself stays external (OUT
// OF SCOPE); `CodeSearchCore` only implements the operation semantics so a
// transport layer can call straight into it and serialize the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::health::{HealthChecker, HealthStatus};
use crate::indexing::project::ProjectState;
use crate::indexing::service::{CancellationToken, IndexOptions, IndexingService, DEFAULT_COLLECTION};
use crate::search::hybrid::{HybridSearchEngine, SearchWeights};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProjectOptions {
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub include_documents: bool,
}

impl From<IndexProjectOptions> for IndexOptions {
    fn from(options: IndexProjectOptions) -> Self {
        IndexOptions {
            exclude_patterns: options.exclude_patterns,
            languages: options.languages,
            include_documents: options.include_documents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProjectRequest {
    pub root_path: String,
    pub project_id: Option<String>,
    #[serde(default)]
    pub options: IndexProjectOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProjectResponse {
    pub project_id: String,
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotification {
    pub progress_token: String,
    pub progress: u8,
    pub total: u8,
    pub message: String,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCodeRequest {
    pub query: String,
    pub project_id: Option<String>,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub file_path: String,
    pub language: String,
    pub snippet: String,
    pub score: f32,
    pub line_start: u32,
    pub line_end: u32,
    pub symbol_name: Option<String>,
    pub symbol_type: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCodeResponse {
    pub results: Vec<SearchResultItem>,
    pub total_results: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIndexStatusRequest {
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusEntry {
    pub project_id: String,
    pub root_path: String,
    pub stats: crate::indexing::project::ProjectStats,
    pub status: ProjectState,
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIndexStatusResponse {
    pub projects: Vec<ProjectStatusEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearIndexRequest {
    pub project_id: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearIndexResponse {
    pub success: bool,
    pub cleared_projects: Vec<String>,
    pub message: String,
}

/// Binds `IndexingService` + `HybridSearchEngine` + `HealthChecker` into the
/// five operations a host transport calls directly; owns no transport of
/// its own.
pub struct CodeSearchCore {
    indexing: Arc<IndexingService>,
    health: Arc<HealthChecker>,
    weights: SearchWeights,
}

impl CodeSearchCore {
    pub fn new(indexing: Arc<IndexingService>, health: Arc<HealthChecker>, weights: SearchWeights) -> Self {
        Self { indexing, health, weights }
    }

    pub async fn index_project(&self, request: IndexProjectRequest) -> IndexProjectResponse {
        let project_id = request.project_id.clone().unwrap_or_else(|| request.root_path.clone());
        let options: IndexOptions = request.options.into();

        match self
            .indexing
            .index_project(&project_id, &request.root_path, options, CancellationToken::new())
            .await
        {
            Ok(outcome) => IndexProjectResponse {
                project_id,
                indexed_files: outcome.indexed_files,
                skipped_files: outcome.skipped_files,
                errors: outcome.errors,
            },
            Err(e) => IndexProjectResponse {
                project_id,
                indexed_files: 0,
                skipped_files: 0,
                errors: vec![e.to_string()],
            },
        }
    }

    /// Errors during search degrade to an empty result set with
    /// `search_time_ms` still populated.
    pub async fn search_code(&self, request: SearchCodeRequest) -> SearchCodeResponse {
        let started = Instant::now();

        let query_vector = match self.indexing.embedder().embed(&request.query).await {
            Ok(vector) => vector,
            Err(_) => {
                return SearchCodeResponse {
                    results: Vec::new(),
                    total_results: 0,
                    search_time_ms: started.elapsed().as_millis() as u64,
                }
            }
        };

        let engine = HybridSearchEngine::new(self.indexing.vector_store().clone(), self.weights);
        let matches = {
            let bm25 = self.indexing.bm25().read().await;
            engine
                .search(DEFAULT_COLLECTION, &request.query, &query_vector, &bm25, request.top_k, None)
                .await
        };

        let wanted_extensions: Vec<String> = request
            .file_types
            .iter()
            .map(|t| t.trim_start_matches('.').to_lowercase())
            .collect();

        let results: Vec<SearchResultItem> = matches
            .into_iter()
            .filter(|m| matches_extension(m, &wanted_extensions))
            .filter(|m| matches_language(m, &request.languages))
            .map(to_search_result_item)
            .collect();

        SearchCodeResponse {
            total_results: results.len(),
            results,
            search_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub async fn get_index_status(&self, request: GetIndexStatusRequest) -> GetIndexStatusResponse {
        let projects = match &request.project_id {
            Some(id) => self.indexing.get_project(id).await.into_iter().collect(),
            None => self.indexing.list_projects().await,
        };

        let entries = projects
            .into_iter()
            .map(|project| ProjectStatusEntry {
                project_id: project.project_id,
                root_path: project.root_path,
                stats: project.stats,
                status: project.state,
                errors: if project.errors.is_empty() { None } else { Some(project.errors) },
            })
            .collect();

        GetIndexStatusResponse { projects: entries }
    }

    /// Without `confirm: true` this is a no-op.
    pub async fn clear_index(&self, request: ClearIndexRequest) -> ClearIndexResponse {
        if !request.confirm {
            return ClearIndexResponse {
                success: false,
                cleared_projects: Vec::new(),
                message: "pass confirm: true to clear the index".to_string(),
            };
        }

        match &request.project_id {
            Some(id) => match self.indexing.clear_index(id).await {
                Ok(()) => ClearIndexResponse {
                    success: true,
                    cleared_projects: vec![id.clone()],
                    message: format!("cleared project '{}'", id),
                },
                Err(e) => ClearIndexResponse {
                    success: false,
                    cleared_projects: Vec::new(),
                    message: e.to_string(),
                },
            },
            None => match self.indexing.clear_all_indexes().await {
                Ok(cleared) => {
                    let message = format!("cleared {} project(s)", cleared.len());
                    ClearIndexResponse { success: true, cleared_projects: cleared, message }
                }
                Err(e) => ClearIndexResponse {
                    success: false,
                    cleared_projects: Vec::new(),
                    message: e.to_string(),
                },
            },
        }
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.health.check().await
    }
}

fn matches_extension(result: &crate::model::QueryResult, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let Some(path) = result.metadata.get("path").and_then(|v| v.as_str()) else {
        return false;
    };
    let Some(ext) = path.rsplit('.').next() else {
        return false;
    };
    wanted.iter().any(|w| w.eq_ignore_ascii_case(ext))
}

fn matches_language(result: &crate::model::QueryResult, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let Some(language) = result.metadata.get("language").and_then(|v| v.as_str()) else {
        return false;
    };
    wanted.iter().any(|w| w.eq_ignore_ascii_case(language))
}

fn to_search_result_item(result: crate::model::QueryResult) -> SearchResultItem {
    let path = result.metadata.get("path").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let language = result.metadata.get("language").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let snippet = result.metadata.get("snippet").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let line_start = result.metadata.get("line_start").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let line_end = result.metadata.get("line_end").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let symbol_name = result.metadata.get("symbol_name").and_then(|v| v.as_str()).map(str::to_string);
    let symbol_type = result.metadata.get("symbol_type").and_then(|v| v.as_str()).map(str::to_string);

    SearchResultItem {
        file_path: path,
        language,
        snippet,
        score: result.score,
        line_start,
        line_end,
        symbol_name,
        symbol_type,
        metadata: result.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::storage::MemoryVectorStore;
    use tempfile::TempDir;

    fn core() -> CodeSearchCore {
        let embedder: Arc<dyn crate::embedding::Embedder> = Arc::new(NullEmbedder::default());
        let vector_store: Arc<dyn crate::storage::VectorStore> = Arc::new(MemoryVectorStore::new());
        let indexing = Arc::new(IndexingService::new(embedder.clone(), vector_store.clone()));
        let health = Arc::new(HealthChecker::new(embedder, vector_store));
        CodeSearchCore::new(indexing, health, SearchWeights::default())
    }

    #[tokio::test]
    async fn indexing_one_function_then_searching_for_it_finds_it() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("lib.rs"), "fn greet(name: &str) { println!(\"{}\", name); }\n").unwrap();
        let core = core();

        let index_response = core
            .index_project(IndexProjectRequest {
                root_path: tmp.path().to_str().unwrap().to_string(),
                project_id: Some("proj".to_string()),
                options: IndexProjectOptions::default(),
            })
            .await;
        assert_eq!(index_response.indexed_files, 1);

        let search_response = core
            .search_code(SearchCodeRequest {
                query: "greet".to_string(),
                project_id: Some("proj".to_string()),
                file_types: Vec::new(),
                languages: Vec::new(),
                top_k: 10,
            })
            .await;

        assert!(!search_response.results.is_empty());
        assert!(search_response.results[0].snippet.contains("greet"));
    }

    #[tokio::test]
    async fn clear_index_without_confirm_is_a_no_op() {
        let core = core();
        let response = core.clear_index(ClearIndexRequest { project_id: None, confirm: false }).await;
        assert!(!response.success);
        assert!(response.cleared_projects.is_empty());
    }

    #[tokio::test]
    async fn health_check_reports_healthy_with_reference_backends() {
        let core = core();
        let status = core.health_check().await;
        assert_eq!(status.status, crate::health::OverallStatus::Healthy);
    }
}
