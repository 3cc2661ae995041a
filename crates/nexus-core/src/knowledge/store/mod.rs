//! Graph persistence and query service.
//!
//! A store receives one complete [`GraphSnapshot`] per run and replaces its
//! previous graph with it atomically. Readers either see the old graph or
//! the new one, never a mix.
//!
//! - [`SurrealStore`] - embedded SurrealDB with BM25 and HNSW indexes
//! - [`MemoryStore`] - in-process store for tests and throwaway runs

mod memory;
mod surreal;

pub use memory::MemoryStore;
pub use surreal::{ChunkRecord, SurrealStore, EMBEDDING_DIMENSION};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::KnowledgeError;
use super::graph::GraphSnapshot;
use super::ontology::{CommunityNode, ProcessNode, SymbolKind};

/// Node tables that carry a keyword index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityTable {
    File,
    Function,
    Class,
    Method,
}

impl EntityTable {
    /// Tables searched by keyword queries, in query order.
    pub const SEARCHABLE: [EntityTable; 4] = [Self::File, Self::Function, Self::Class, Self::Method];

    pub fn table(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
        }
    }

    /// Name of the full-text index over this table.
    pub fn keyword_index(&self) -> &'static str {
        match self {
            Self::File => "file_fts",
            Self::Function => "function_fts",
            Self::Class => "class_fts",
            Self::Method => "method_fts",
        }
    }

    /// Fields covered by the full-text index.
    pub fn keyword_fields(&self) -> &'static [&'static str] {
        match self {
            Self::File => &["path", "content"],
            _ => &["name", "snippet"],
        }
    }

    /// Symbol kind stored in this table, `None` for files.
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            Self::File => None,
            Self::Function => Some(SymbolKind::Function),
            Self::Class => Some(SymbolKind::Class),
            Self::Method => Some(SymbolKind::Method),
        }
    }
}

impl std::fmt::Display for EntityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// A file path with a relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPath {
    pub file_path: String,
    pub score: f64,
}

impl ScoredPath {
    pub fn new(file_path: impl Into<String>, score: f64) -> Self {
        Self { file_path: file_path.into(), score }
    }
}

/// A member symbol of a community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
}

/// One step of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub step: u32,
    pub name: String,
    pub file_path: String,
}

/// Row counts of the stored graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub files: usize,
    pub symbols: usize,
    pub communities: usize,
    pub processes: usize,
    pub relations: usize,
}

/// Persistence and query service for the knowledge graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Replace the stored graph with `snapshot`.
    async fn load(&self, snapshot: &GraphSnapshot) -> Result<(), KnowledgeError>;

    /// Run a raw query in the store's own language.
    async fn query(&self, statement: &str) -> Result<Vec<serde_json::Value>, KnowledgeError>;

    /// Create a full-text index over `fields` of a table. Idempotent.
    async fn create_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        fields: &[&str],
    ) -> Result<(), KnowledgeError>;

    /// BM25 search of one keyword index, best first.
    async fn query_keyword_index(
        &self,
        table: EntityTable,
        index: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPath>, KnowledgeError>;

    /// Community by label or id. The lowest-numbered match wins.
    async fn find_community(&self, name: &str) -> Result<Option<CommunityNode>, KnowledgeError>;

    /// Members of a community in symbol order.
    async fn community_members(
        &self,
        community_id: &str,
    ) -> Result<Vec<CommunityMember>, KnowledgeError>;

    /// Process by label or id. The lowest-numbered match wins.
    async fn find_process(&self, name: &str) -> Result<Option<ProcessNode>, KnowledgeError>;

    /// Steps of a process ordered by step number.
    async fn process_steps(&self, process_id: &str) -> Result<Vec<ProcessStep>, KnowledgeError>;

    /// Largest communities first.
    async fn list_communities(&self, limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError>;

    /// Longest processes first.
    async fn list_processes(&self, limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError>;

    async fn stats(&self) -> Result<StoreStats, KnowledgeError>;
}

/// Numeric suffix of an overlay id (`community:12` → 12), for ordering.
pub(crate) fn id_number(id: &str) -> usize {
    id.rsplit(':').next().and_then(|n| n.parse().ok()).unwrap_or(usize::MAX)
}
