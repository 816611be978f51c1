// IndexingService: a per-projectId orchestrator for scan -> parse ->
// extract -> chunk -> embed -> persist, with progress reporting, a
// cancellation token, and the vector-store-then-BM25 write ordering
// invariant. Files index through a semaphore-bounded pool sized to the CPU
// count; chunk embedding within a file runs through a second, separately
// sized semaphore; the initial vector-store connect retries with backoff.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tokio::time::timeout;

use futures::future::join_all;

use crate::chunking::Chunker;
use crate::comments::CommentExtractor;
use crate::embedding::Embedder;
use crate::error::{retry_with_backoff, IndexError, Result};
use crate::language::{detect_language, Language};
use crate::model::{FileRecord, VectorEntry};
use crate::observability::{IndexingObserver, NoopObserver};
use crate::scanner::FileScanner;
use crate::search::bm25::BM25Index;
use crate::storage::VectorStore;
use crate::symbols::SymbolExtractor;

use super::project::{Project, ProjectState, ProjectStats};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);
const STORE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_COLLECTION: &str = "code_vectors";
/// Size of the embedder call pool. Kept independent of the file-parsing
/// pool (which is sized to the CPU count) since embed calls are typically
/// network/accelerator bound rather than CPU bound.
const EMBED_POOL_SIZE: usize = 8;

fn file_pool_size() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub exclude_patterns: Vec<String>,
    pub languages: Option<Vec<String>>,
    pub include_documents: bool,
}

#[derive(Debug, Clone)]
pub struct IndexProjectOutcome {
    pub indexed_files: usize,
    pub skipped_files: usize,
    pub errors: Vec<String>,
}

/// Cooperative cancellation signal for an in-flight `index_project` call.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IndexingService {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    bm25: RwLock<BM25Index>,
    observer: Arc<dyn IndexingObserver>,
    projects: RwLock<HashMap<String, Arc<Mutex<Project>>>>,
    in_flight: Mutex<std::collections::HashSet<String>>,
}

impl IndexingService {
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            vector_store,
            bm25: RwLock::new(BM25Index::new()),
            observer: Arc::new(NoopObserver),
            projects: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IndexingObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    pub fn bm25(&self) -> &RwLock<BM25Index> {
        &self.bm25
    }

    pub async fn list_projects(&self) -> Vec<Project> {
        let projects = self.projects.read().await;
        let mut out = Vec::with_capacity(projects.len());
        for handle in projects.values() {
            out.push(handle.lock().await.clone());
        }
        out
    }

    pub async fn get_project(&self, project_id: &str) -> Option<Project> {
        let projects = self.projects.read().await;
        match projects.get(project_id) {
            Some(handle) => Some(handle.lock().await.clone()),
            None => None,
        }
    }

    /// Orchestrates scan -> parse -> extract -> chunk -> embed -> persist
    /// for one project. Concurrent calls on the same `project_id` fail with
    /// `AlreadyRunning`.
    pub async fn index_project(
        &self,
        project_id: &str,
        root_path: &str,
        options: IndexOptions,
        cancel: CancellationToken,
    ) -> Result<IndexProjectOutcome> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.contains(project_id) {
                return Err(IndexError::AlreadyRunning {
                    project_id: project_id.to_string(),
                });
            }
            in_flight.insert(project_id.to_string());
        }

        let result = self.run_index(project_id, root_path, &options, &cancel).await;
        self.in_flight.lock().await.remove(project_id);
        result
    }

    async fn run_index(
        &self,
        project_id: &str,
        root_path: &str,
        options: &IndexOptions,
        cancel: &CancellationToken,
    ) -> Result<IndexProjectOutcome> {
        let root = Path::new(root_path);

        retry_with_backoff(Duration::from_secs(10), || self.vector_store.connect()).await?;

        if self.vector_store.get_stats(DEFAULT_COLLECTION).await.is_err() {
            let _ = self
                .vector_store
                .create_collection(DEFAULT_COLLECTION, self.embedder.dimension())
                .await;
        }

        self.observer.on_scan_progress(project_id, 0);
        let scanner = FileScanner::new(root, options.exclude_patterns.clone(), options.languages.clone());
        let (tx, mut rx) = mpsc::channel(256);
        let scan_task = tokio::spawn(async move { scanner.scan(tx).await });
        while rx.recv().await.is_some() {}
        let files = scan_task
            .await
            .map_err(|e| IndexError::Internal {
                message: format!("scan task panicked: {}", e),
                source: None,
            })??;
        self.observer.on_scan_progress(project_id, 20);

        let mut project = Project::new(project_id, root_path);
        project.state = ProjectState::Indexing;

        let mut indexed = 0usize;
        let mut skipped = 0usize;
        let mut errors = Vec::new();
        let total = files.len().max(1);

        let file_pool = Arc::new(Semaphore::new(file_pool_size()));
        let embed_pool = Arc::new(Semaphore::new(EMBED_POOL_SIZE));
        let completed = AtomicUsize::new(0);

        let outcomes: Vec<(&Path, Result<FileRecord>)> = join_all(files.iter().map(|path| {
            let file_pool = file_pool.clone();
            let embed_pool = embed_pool.clone();
            let completed = &completed;
            async move {
                if cancel.is_cancelled() {
                    return (
                        path.as_path(),
                        Err(IndexError::Cancelled {
                            operation: format!("index_project:{}", project_id),
                        }),
                    );
                }

                let _permit = file_pool.acquire().await.expect("file pool semaphore closed");
                let outcome = self.index_file(project_id, root, path, options, &embed_pool).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                let parse_progress = 20 + (done * 40 / total) as u8;
                self.observer.on_parse_progress(project_id, parse_progress.min(60));

                (path.as_path(), outcome)
            }
        }))
        .await;

        if cancel.is_cancelled() {
            project.state = ProjectState::Error;
            project.errors.push("cancelled".to_string());
            self.projects
                .write()
                .await
                .insert(project_id.to_string(), Arc::new(Mutex::new(project)));
            return Err(IndexError::Cancelled {
                operation: format!("index_project:{}", project_id),
            });
        }

        for (path, outcome) in outcomes {
            match outcome {
                Ok(record) => {
                    project.stats.total_symbols += record.symbols.len();
                    project.stats.total_documents += usize::from(record.language == "markdown");
                    project.files.insert(record.path.clone(), record);
                    indexed += 1;
                }
                Err(e) => {
                    skipped += 1;
                    let message = format!("{}: {}", path.display(), e);
                    self.observer.on_file_error(project_id, &path.display().to_string(), &message);
                    errors.push(message);
                }
            }
        }

        self.observer.on_embed_progress(project_id, 90);
        self.observer.on_persist_progress(project_id, 100);

        project.state = ProjectState::Indexed;
        project.stats.total_files = files.len();
        project.stats.indexed_files = indexed;
        project.stats.last_indexed_at = Some(Utc::now());
        if let Ok(stats) = self.vector_store.get_stats(DEFAULT_COLLECTION).await {
            project.stats.total_vectors = stats.vector_count;
            project.stats.index_size = stats.index_size;
        }

        self.observer.on_indexed(project_id, indexed, skipped);
        self.projects
            .write()
            .await
            .insert(project_id.to_string(), Arc::new(Mutex::new(project)));

        Ok(IndexProjectOutcome {
            indexed_files: indexed,
            skipped_files: skipped,
            errors,
        })
    }

    async fn index_file(
        &self,
        project_id: &str,
        root: &Path,
        path: &Path,
        options: &IndexOptions,
        embed_pool: &Semaphore,
    ) -> Result<FileRecord> {
        let language = detect_language(path).ok_or_else(|| IndexError::ParseError {
            path: path.display().to_string(),
            message: "unsupported language".to_string(),
        })?;

        let source = tokio::fs::read_to_string(path).await.map_err(IndexError::from)?;
        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let lang_name = language_name(language);
        let is_markdown = language == Language::Markdown;

        let symbols = if is_markdown {
            Vec::new()
        } else {
            SymbolExtractor::new().extract(&source, language, &rel_path)
        };
        let comments = if is_markdown {
            Vec::new()
        } else {
            CommentExtractor::new().extract(&source, language, &symbols)
        };

        if is_markdown && !options.include_documents {
            return Ok(FileRecord {
                path: rel_path,
                language: lang_name,
                mtime: Utc::now(),
                chunk_ids: Vec::new(),
                symbols,
                comments,
            });
        }

        let chunks = Chunker::new().chunk_file(&source, &symbols, &rel_path, project_id, &lang_name, is_markdown);

        // Embed every chunk in the file concurrently, bounded by the
        // embedder pool shared across all in-flight files.
        let embedded = join_all(chunks.iter().map(|chunk| async move {
            let _permit = embed_pool.acquire().await.expect("embed pool semaphore closed");
            timeout(EMBED_TIMEOUT, self.embedder.embed(&chunk.text)).await
        }))
        .await;

        let mut vector_entries = Vec::with_capacity(chunks.len());
        let mut chunk_ids = Vec::with_capacity(chunks.len());
        let mut bm25_upserts = Vec::with_capacity(chunks.len());

        for (chunk, embed_result) in chunks.iter().zip(embedded) {
            let vector = embed_result
                .map_err(|_| IndexError::BackendUnavailable {
                    backend: "embedder".to_string(),
                    message: "embed call timed out".to_string(),
                    source: None,
                })??;

            let mut metadata = HashMap::new();
            metadata.insert("path".to_string(), serde_json::json!(chunk.metadata.path));
            metadata.insert("language".to_string(), serde_json::json!(chunk.metadata.language));
            metadata.insert("line_start".to_string(), serde_json::json!(chunk.metadata.line_start));
            metadata.insert("line_end".to_string(), serde_json::json!(chunk.metadata.line_end));
            metadata.insert("project_id".to_string(), serde_json::json!(chunk.metadata.project_id));
            metadata.insert("snippet".to_string(), serde_json::json!(chunk.text));
            if let Some(name) = &chunk.metadata.symbol_name {
                metadata.insert("symbol_name".to_string(), serde_json::json!(name));
            }
            if let Some(kind) = chunk.metadata.symbol_type {
                metadata.insert("symbol_type".to_string(), serde_json::json!(format!("{:?}", kind)));
            }

            vector_entries.push(VectorEntry {
                id: chunk.id.clone(),
                vector,
                metadata,
            });
            chunk_ids.push(chunk.id.clone());
            bm25_upserts.push((chunk.id.clone(), chunk.tokens.clone()));
        }

        // vector-store write happens before BM25 write, per the ordering invariant.
        timeout(STORE_TIMEOUT, self.vector_store.upsert(DEFAULT_COLLECTION, vector_entries))
            .await
            .map_err(|_| IndexError::BackendUnavailable {
                backend: "vector-store".to_string(),
                message: "upsert call timed out".to_string(),
                source: None,
            })??;

        {
            let mut bm25 = self.bm25.write().await;
            for (id, tokens) in bm25_upserts {
                bm25.upsert(DEFAULT_COLLECTION, &id, &tokens);
            }
        }

        Ok(FileRecord {
            path: rel_path,
            language: lang_name,
            mtime: Utc::now(),
            chunk_ids,
            symbols,
            comments,
        })
    }

    pub async fn update_file(&self, project_id: &str, path: &Path) -> Result<()> {
        let projects = self.projects.read().await;
        let Some(project_handle) = projects.get(project_id) else {
            return Err(IndexError::NotFound {
                resource: format!("project '{}'", project_id),
            });
        };
        let root = project_handle.lock().await.root_path.clone();
        drop(projects);
        let embed_pool = Semaphore::new(EMBED_POOL_SIZE);
        let record = self
            .index_file(project_id, Path::new(&root), path, &IndexOptions::default(), &embed_pool)
            .await?;

        let projects = self.projects.read().await;
        if let Some(project_handle) = projects.get(project_id) {
            let mut project = project_handle.lock().await;
            project.files.insert(record.path.clone(), record);
        }
        Ok(())
    }

    pub async fn delete_file(&self, project_id: &str, path: &Path) -> Result<()> {
        let projects = self.projects.read().await;
        let Some(project_handle) = projects.get(project_id) else {
            return Err(IndexError::NotFound {
                resource: format!("project '{}'", project_id),
            });
        };
        let mut project = project_handle.lock().await;
        let rel_path = path.to_string_lossy().replace('\\', "/");
        if let Some(record) = project.files.remove(&rel_path) {
            self.vector_store.delete(DEFAULT_COLLECTION, &record.chunk_ids).await?;
            let mut bm25 = self.bm25.write().await;
            for id in &record.chunk_ids {
                bm25.delete(DEFAULT_COLLECTION, id);
            }
        }
        Ok(())
    }

    pub async fn get_index_stats(&self, project_id: &str) -> Result<ProjectStats> {
        let projects = self.projects.read().await;
        let project_handle = projects.get(project_id).ok_or_else(|| IndexError::NotFound {
            resource: format!("project '{}'", project_id),
        })?;
        let stats = project_handle.lock().await.stats.clone();
        Ok(stats)
    }

    pub async fn get_all_index_stats(&self) -> HashMap<String, ProjectStats> {
        let projects = self.projects.read().await;
        let mut out = HashMap::new();
        for (id, handle) in projects.iter() {
            out.insert(id.clone(), handle.lock().await.stats.clone());
        }
        out
    }

    pub async fn clear_index(&self, project_id: &str) -> Result<()> {
        let mut projects = self.projects.write().await;
        if let Some(project_handle) = projects.remove(project_id) {
            let project = project_handle.lock().await;
            let ids: Vec<String> = project.files.values().flat_map(|f| f.chunk_ids.clone()).collect();
            drop(project);
            self.vector_store.delete(DEFAULT_COLLECTION, &ids).await?;
            let mut bm25 = self.bm25.write().await;
            for id in &ids {
                bm25.delete(DEFAULT_COLLECTION, id);
            }
        }
        Ok(())
    }

    pub async fn clear_all_indexes(&self) -> Result<Vec<String>> {
        let project_ids: Vec<String> = self.projects.read().await.keys().cloned().collect();
        for id in &project_ids {
            self.clear_index(id).await?;
        }
        Ok(project_ids)
    }
}

fn language_name(language: Language) -> String {
    match language {
        Language::TypeScript => "typescript",
        Language::JavaScript => "javascript",
        Language::Python => "python",
        Language::Go => "go",
        Language::Rust => "rust",
        Language::Java => "java",
        Language::C => "c",
        Language::Cpp => "cpp",
        Language::Markdown => "markdown",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NullEmbedder;
    use crate::storage::MemoryVectorStore;
    use tempfile::TempDir;

    fn service() -> IndexingService {
        IndexingService::new(Arc::new(NullEmbedder::default()), Arc::new(MemoryVectorStore::new()))
    }

    #[tokio::test]
    async fn indexes_a_single_function_into_one_chunk() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("lib.rs"), "fn greet(name: &str) { println!(\"{}\", name); }\n").unwrap();

        let service = service();
        let outcome = service
            .index_project("proj", tmp.path().to_str().unwrap(), IndexOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.indexed_files, 1);
        assert_eq!(outcome.skipped_files, 0);
        let stats = service.get_index_stats("proj").await.unwrap();
        assert!(stats.total_vectors >= 1);
    }

    #[tokio::test]
    async fn concurrent_index_on_same_project_fails_with_already_running() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn a() {}\n").unwrap();
        let service = Arc::new(service());

        let root = tmp.path().to_str().unwrap().to_string();
        let s1 = service.clone();
        let r1 = root.clone();
        let first = tokio::spawn(async move {
            s1.index_project("proj", &r1, IndexOptions::default(), CancellationToken::new())
                .await
        });

        let second = service
            .index_project("proj", &root, IndexOptions::default(), CancellationToken::new())
            .await;

        let _ = first.await;
        // Either this call or the spawned one observes AlreadyRunning, never both succeeding
        // concurrently is the invariant; here we only assert the API surfaces the error kind
        // when it does occur.
        if let Err(e) = second {
            assert!(matches!(e, IndexError::AlreadyRunning { .. }));
        }
    }

    #[tokio::test]
    async fn indexes_through_a_caching_embedder() {
        use crate::embedding::CachingEmbedder;

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn shared() { /* boilerplate */ }\n").unwrap();
        std::fs::write(tmp.path().join("b.rs"), "fn shared() { /* boilerplate */ }\n").unwrap();

        let embedder = Arc::new(CachingEmbedder::new(Arc::new(NullEmbedder::default()), 64));
        let service = IndexingService::new(embedder, Arc::new(MemoryVectorStore::new()));

        let outcome = service
            .index_project("proj", tmp.path().to_str().unwrap(), IndexOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.indexed_files, 2);
        assert_eq!(outcome.skipped_files, 0);
    }

    #[tokio::test]
    async fn clear_index_empties_vector_store() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.rs"), "fn a() {}\n").unwrap();
        let service = service();
        service
            .index_project("proj", tmp.path().to_str().unwrap(), IndexOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        service.clear_index("proj").await.unwrap();
        assert!(service.get_index_stats("proj").await.is_err());
    }
}
