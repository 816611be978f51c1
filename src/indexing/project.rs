// Per-project in-memory state (Project/FileRecord rows).
// IndexingService owns one of these per projectId; queries see only the
// snapshot left by the last completed `index_project` pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectState {
    Idle,
    Indexing,
    Indexed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectStats {
    pub total_files: usize,
    pub indexed_files: usize,
    pub total_symbols: usize,
    pub total_vectors: usize,
    pub total_documents: usize,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub index_size: usize,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub project_id: String,
    pub root_path: String,
    pub state: ProjectState,
    pub errors: Vec<String>,
    pub stats: ProjectStats,
    pub files: HashMap<String, FileRecord>,
}

impl Project {
    pub fn new(project_id: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            root_path: root_path.into(),
            state: ProjectState::Idle,
            errors: Vec::new(),
            stats: ProjectStats::default(),
            files: HashMap::new(),
        }
    }
}
