//! Code knowledge graph: structure, clusters and execution flows of a
//! repository, with hybrid search over it.
//!
//! One ingestion run goes through these stages:
//!
//! 1. **Extract** - tree-sitter extractors turn each file into definitions
//!    and references ([`parser`])
//! 2. **Assemble** - files, symbols and resolved relations become one typed
//!    graph ([`graph`])
//! 3. **Cluster** - Louvain partitions symbols into communities
//!    ([`community`])
//! 4. **Trace** - call chains from entry points become processes
//!    ([`process`])
//! 5. **Load** - the snapshot replaces the stored graph and the keyword
//!    indexes are (re)built ([`store`])
//!
//! Search combines BM25 keyword hits over files and symbols with embedding
//! similarity ([`search`]).
//!
//! # Example
//!
//! ```ignore
//! use nexus_core::config::Config;
//! use nexus_core::knowledge::{KnowledgeGraph, KnowledgeStore};
//!
//! let kg = KnowledgeGraph::open(Path::new(".nexus/graph.db"), Config::default()).await?;
//! let summary = kg.ingest_directory(Path::new(".")).await?;
//! let hits = kg.search("authentication handler", 10).await?;
//! ```

pub mod community;
mod embedder;
mod error;
pub mod graph;
pub mod ontology;
pub mod parser;
pub mod pipeline;
pub mod process;
pub mod search;
pub mod store;
mod tokenize;

pub use embedder::{Embedder, EmbeddingSearch, FastEmbedder};
pub use error::KnowledgeError;
pub use graph::{AssemblyStats, GraphSnapshot};
pub use pipeline::SkippedFile;
pub use search::{HybridRetriever, SearchHit, SemanticSearch};
pub use store::{GraphStore, MemoryStore, StoreStats, SurrealStore};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use ontology::{CommunityNode, ProcessNode, ProcessType};
use store::{CommunityMember, EntityTable, ProcessStep};

/// Result of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub file_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub community_count: usize,
    pub process_count: usize,
    pub skipped_files: Vec<SkippedFile>,
    /// Resolved and dropped references.
    pub resolution: AssemblyStats,
    /// Symbols embedded for semantic search; 0 when embeddings are off.
    pub embedded_symbols: usize,
}

/// A community with its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDetail {
    pub id: String,
    pub label: String,
    pub cohesion: f64,
    pub symbol_count: usize,
    pub members: Vec<CommunityMember>,
}

/// A process with its ordered steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub id: String,
    pub label: String,
    pub process_type: ProcessType,
    pub step_count: usize,
    pub community_count: usize,
    pub steps: Vec<ProcessStep>,
}

/// Main interface for the knowledge graph.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Build the graph from `(path, content)` pairs and replace the stored one.
    async fn ingest(&self, files: Vec<(String, String)>) -> Result<IngestSummary, KnowledgeError>;

    /// Walk a repository and ingest its source files.
    async fn ingest_directory(&self, root: &Path) -> Result<IngestSummary, KnowledgeError>;

    /// Community by label or id, with its members.
    async fn cluster_detail(&self, name: &str) -> Result<ClusterDetail, KnowledgeError>;

    /// Process by label or id, with its steps.
    async fn process_detail(&self, name: &str) -> Result<ProcessDetail, KnowledgeError>;

    /// Hybrid search over files and symbols.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KnowledgeError>;

    /// Largest communities first.
    async fn list_clusters(&self, limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError>;

    /// Longest processes first.
    async fn list_processes(&self, limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError>;
}

/// The main knowledge graph implementation.
pub struct KnowledgeGraph {
    store: Arc<dyn GraphStore>,
    embeddings: Option<Arc<EmbeddingSearch>>,
    config: Config,
}

impl KnowledgeGraph {
    /// Open (or create) the SurrealDB graph at `db_path`.
    ///
    /// Loads the embedding model unless `ingest.skip_embeddings` is set. A
    /// model that fails to load disables semantic search with a warning.
    pub async fn open(db_path: &Path, config: Config) -> Result<Self, KnowledgeError> {
        let store = Arc::new(SurrealStore::open(db_path).await?);

        let embeddings = if config.ingest.skip_embeddings {
            None
        } else {
            let cache_dir = config.storage.model_cache_dir();
            let loaded = tokio::task::spawn_blocking(move || FastEmbedder::new(cache_dir))
                .await
                .map_err(|e| KnowledgeError::Task(e.to_string()))?;
            match loaded {
                Ok(embedder) => Some(Arc::new(EmbeddingSearch::new(
                    Arc::new(embedder),
                    Arc::clone(&store),
                ))),
                Err(e) => {
                    warn!(error = %e, "embedding model unavailable, semantic search disabled");
                    None
                }
            }
        };

        Ok(Self {
            store,
            embeddings,
            config,
        })
    }

    /// Graph over any store, without semantic search.
    pub fn with_store(store: Arc<dyn GraphStore>, config: Config) -> Self {
        Self {
            store,
            embeddings: None,
            config,
        }
    }

    /// Throwaway graph held in memory.
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a raw statement against the store.
    pub async fn query(&self, statement: &str) -> Result<Vec<serde_json::Value>, KnowledgeError> {
        self.store.query(statement).await
    }

    pub async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
        self.store.stats().await
    }

    fn retriever(&self) -> HybridRetriever {
        let retriever = HybridRetriever::new(Arc::clone(&self.store), self.config.search.clone());
        match &self.embeddings {
            Some(embeddings) => retriever.with_semantic(Arc::clone(embeddings) as Arc<dyn SemanticSearch>),
            None => retriever,
        }
    }

    /// Run the pipeline over `files` and replace the stored graph.
    ///
    /// `skipped` holds files already left out before extraction.
    async fn ingest_files(
        &self,
        files: Vec<(String, String)>,
        mut skipped: Vec<SkippedFile>,
    ) -> Result<IngestSummary, KnowledgeError> {
        let config = self.config.clone();
        let already_skipped = skipped.len();
        let output = tokio::task::spawn_blocking(move || pipeline::run_pipeline(files, &config))
            .await
            .map_err(|e| KnowledgeError::Task(e.to_string()))?
            .map_err(|e| match e {
                KnowledgeError::NothingExtracted { skipped } => KnowledgeError::NothingExtracted {
                    skipped: skipped + already_skipped,
                },
                other => other,
            })?;
        let snapshot = output.snapshot;
        skipped.extend(output.skipped);
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        self.store.load(&snapshot).await?;
        for table in EntityTable::SEARCHABLE {
            self.store
                .create_keyword_index(table, table.keyword_index(), table.keyword_fields())
                .await?;
        }

        let embedded_symbols = match &self.embeddings {
            Some(embeddings) => embeddings.index_snapshot(&snapshot).await.unwrap_or_else(|e| {
                warn!(error = %e, "embedding failed, semantic search will return nothing");
                0
            }),
            None => 0,
        };

        let summary = IngestSummary {
            file_count: snapshot.files.len(),
            node_count: snapshot.node_count(),
            edge_count: snapshot.edge_count(),
            community_count: snapshot.communities.len(),
            process_count: snapshot.processes.len(),
            skipped_files: skipped,
            resolution: output.stats,
            embedded_symbols,
        };
        info!(
            files = summary.file_count,
            nodes = summary.node_count,
            edges = summary.edge_count,
            communities = summary.community_count,
            processes = summary.process_count,
            "ingestion complete"
        );
        Ok(summary)
    }

    /// `NotInitialized` for an empty store, `EntityNotFound` otherwise.
    async fn missing(&self, what: &str, name: &str) -> KnowledgeError {
        match self.store.stats().await {
            Ok(stats) if stats.files == 0 => KnowledgeError::NotInitialized,
            Err(e) => e,
            Ok(_) => KnowledgeError::EntityNotFound(format!("{} '{}'", what, name)),
        }
    }
}

#[async_trait]
impl KnowledgeStore for KnowledgeGraph {
    async fn ingest(&self, files: Vec<(String, String)>) -> Result<IngestSummary, KnowledgeError> {
        self.ingest_files(files, Vec::new()).await
    }

    async fn ingest_directory(&self, root: &Path) -> Result<IngestSummary, KnowledgeError> {
        let root = root.to_path_buf();
        let ingest = self.config.ingest.clone();
        let repo = tokio::task::spawn_blocking(move || pipeline::collect_repo_files(&root, &ingest))
            .await
            .map_err(|e| KnowledgeError::Task(e.to_string()))??;
        self.ingest_files(repo.files, repo.skipped).await
    }

    async fn cluster_detail(&self, name: &str) -> Result<ClusterDetail, KnowledgeError> {
        let Some(community) = self.store.find_community(name).await? else {
            return Err(self.missing("cluster", name).await);
        };
        let members = self.store.community_members(&community.id).await?;
        Ok(ClusterDetail {
            id: community.id,
            label: community.label,
            cohesion: community.cohesion,
            symbol_count: community.symbol_count,
            members,
        })
    }

    async fn process_detail(&self, name: &str) -> Result<ProcessDetail, KnowledgeError> {
        let Some(process) = self.store.find_process(name).await? else {
            return Err(self.missing("process", name).await);
        };
        let steps = self.store.process_steps(&process.id).await?;
        Ok(ProcessDetail {
            id: process.id,
            label: process.label,
            process_type: process.process_type,
            step_count: process.step_count,
            community_count: process.community_count,
            steps,
        })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KnowledgeError> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.retriever().search(query, limit).await)
    }

    async fn list_clusters(&self, limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError> {
        self.store.list_communities(limit).await
    }

    async fn list_processes(&self, limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError> {
        self.store.list_processes(limit).await
    }
}
