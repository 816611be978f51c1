// Core data model shared by every component: FileRecord, Symbol, Comment,
// Chunk, VectorEntry, BM25Posting, QueryResult. Per-project state
// (Project/ProjectState/ProjectStats) lives in indexing::project instead,
// since it is runtime orchestration state rather than parsed file data.
//
// Comment <-> Symbol is a cyclic reference, so each side stores only a
// stable id and resolution goes through the arena (`symbols: Vec<Symbol>`)
// owned by FileRecord rather than an `Rc`/`RefCell` pair.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index into `FileRecord::symbols`. Stable for the lifetime of one parse
/// pass; re-minted on reparse.
pub type SymbolId = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: String,
    pub mtime: DateTime<Utc>,
    pub chunk_ids: Vec<String>,
    pub symbols: Vec<Symbol>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Enum,
    Constant,
    Variable,
    Trait,
    Impl,
    ArduinoSpecialFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolScope {
    Global,
    Class,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_annotation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub location: Location,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub is_exported: bool,
    pub is_abstract: bool,
    pub is_arduino_special: bool,
    pub extends: Vec<String>,
    pub members: Vec<SymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentKind {
    SingleLine,
    MultiLine,
    DocComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Marker {
    Todo,
    Fixme,
    Note,
    Hack,
    Xxx,
    Bug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocTag {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub kind: CommentKind,
    pub content: String,
    pub position: Location,
    pub marker: Option<Marker>,
    pub tags: Vec<DocTag>,
    pub associated_symbol: Option<SymbolId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub language: String,
    pub path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub project_id: String,
    pub symbol_name: Option<String>,
    pub symbol_type: Option<SymbolKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub vector: Option<Vec<f32>>,
    pub metadata: ChunkMetadata,
    pub tokens: Vec<String>,
}

impl Chunk {
    /// `chunkId = path + ":" + startLine`.
    pub fn make_id(path: &str, start_line: u32) -> String {
        format!("{}:{}", path, start_line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Per-token postings for one collection: `token -> (chunkId -> termFrequency)`.
#[derive(Debug, Clone, Default)]
pub struct BM25Posting {
    pub postings: HashMap<String, HashMap<String, u32>>,
    pub doc_lengths: HashMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}
