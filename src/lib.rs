pub mod chunking;
pub mod comments;
pub mod config;
pub mod doc_linker;
pub mod embedding;
pub mod error;
pub mod health;
pub mod ignore_rules;
pub mod indexing;
pub mod language;
pub mod markdown;
pub mod model;
pub mod observability;
pub mod ops;
pub mod parser;
pub mod scanner;
pub mod search;
pub mod storage;
pub mod symbols;
pub mod watcher;

pub use chunking::Chunker;
pub use comments::CommentExtractor;
pub use config::{Config, Mode};
pub use doc_linker::DocCodeLinker;
pub use embedding::{Embedder, NullEmbedder};
pub use error::{IndexError, Result};
pub use health::{HealthChecker, HealthStatus};
pub use ignore_rules::IgnoreRules;
pub use indexing::{IndexOptions, IndexProjectOutcome, IndexingService, Project, ProjectState, ProjectStats};
pub use language::{detect_language, Language};
pub use markdown::MarkdownParser;
pub use observability::{IndexingObserver, NoopObserver};
pub use ops::CodeSearchCore;
pub use parser::parse;
pub use scanner::FileScanner;
pub use search::{BM25Index, HybridSearchEngine, SearchWeights};
pub use storage::{MemoryVectorStore, SledVectorStore, VectorStore};
pub use symbols::SymbolExtractor;
pub use watcher::FileWatcher;
