//! Hybrid retrieval: keyword search across entity indexes, semantic
//! similarity, and rank fusion of the two.
//!
//! No source can fail a search. A failing or slow index is logged and
//! contributes nothing, so the worst case is an empty result list.

mod fusion;
mod keyword;

pub use fusion::RankFusion;
pub use keyword::{keyword_search, merge_keyword_hits};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::store::{GraphStore, ScoredPath};

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file_path: String,
    pub score: f64,
    /// 1-based position in the result list
    pub rank: usize,
}

/// Semantic similarity lookup over embedded code.
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    /// Files most similar to `query`, best first.
    async fn query_similar(&self, query: &str, limit: usize) -> Result<Vec<ScoredPath>, KnowledgeError>;
}

/// Keyword plus optional semantic search over one store.
pub struct HybridRetriever {
    store: Arc<dyn GraphStore>,
    semantic: Option<Arc<dyn SemanticSearch>>,
    config: SearchConfig,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn GraphStore>, config: SearchConfig) -> Self {
        Self {
            store,
            semantic: None,
            config,
        }
    }

    /// Add a semantic source.
    pub fn with_semantic(mut self, semantic: Arc<dyn SemanticSearch>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Search and return at most `limit` hits ranked `1..`.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let timeout = self.config.index_timeout();

        let keyword = keyword_search(self.store.as_ref(), query, limit, timeout);
        let semantic = async {
            let Some(semantic) = &self.semantic else {
                return Vec::new();
            };
            match tokio::time::timeout(timeout, semantic.query_similar(query, limit)).await {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    warn!(error = %e, "semantic search failed, using keyword results only");
                    Vec::new()
                }
                Err(_) => {
                    warn!(?timeout, "semantic search timed out, using keyword results only");
                    Vec::new()
                }
            }
        };
        let (keyword, semantic) = tokio::join!(keyword, semantic);

        debug!(
            keyword = keyword.len(),
            semantic = semantic.len(),
            "search sources answered"
        );

        if semantic.is_empty() {
            return keyword;
        }
        RankFusion::from_config(&self.config).fuse(&keyword, &semantic, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionStrategy;
    use crate::knowledge::graph::GraphSnapshot;
    use crate::knowledge::ontology::{CommunityNode, ProcessNode};
    use crate::knowledge::store::{
        CommunityMember, EntityTable, ProcessStep, StoreStats,
    };
    use std::time::Duration;

    /// Store answering keyword queries from a fixed table, optionally
    /// failing or stalling one index.
    struct FixedStore {
        failing: Option<EntityTable>,
        stalling: Option<EntityTable>,
    }

    #[async_trait]
    impl GraphStore for FixedStore {
        async fn load(&self, _snapshot: &GraphSnapshot) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn query(&self, _statement: &str) -> Result<Vec<serde_json::Value>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn create_keyword_index(
            &self,
            _table: EntityTable,
            _index: &str,
            _fields: &[&str],
        ) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn query_keyword_index(
            &self,
            table: EntityTable,
            index: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<ScoredPath>, KnowledgeError> {
            if self.failing == Some(table) {
                return Err(KnowledgeError::IndexQuery {
                    index: index.to_string(),
                    message: "boom".to_string(),
                });
            }
            if self.stalling == Some(table) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(match table {
                EntityTable::File => vec![ScoredPath::new("f1", 5.0)],
                EntityTable::Function => vec![ScoredPath::new("f1", 3.0), ScoredPath::new("f2", 2.0)],
                EntityTable::Class => vec![ScoredPath::new("f3", 10.0)],
                EntityTable::Method => Vec::new(),
            })
        }

        async fn find_community(&self, _name: &str) -> Result<Option<CommunityNode>, KnowledgeError> {
            Ok(None)
        }

        async fn community_members(&self, _id: &str) -> Result<Vec<CommunityMember>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn find_process(&self, _name: &str) -> Result<Option<ProcessNode>, KnowledgeError> {
            Ok(None)
        }

        async fn process_steps(&self, _id: &str) -> Result<Vec<ProcessStep>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn list_communities(&self, _limit: usize) -> Result<Vec<CommunityNode>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn list_processes(&self, _limit: usize) -> Result<Vec<ProcessNode>, KnowledgeError> {
            Ok(Vec::new())
        }

        async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
            Ok(StoreStats::default())
        }
    }

    struct FixedSemantic(Result<Vec<ScoredPath>, ()>);

    #[async_trait]
    impl SemanticSearch for FixedSemantic {
        async fn query_similar(&self, _query: &str, _limit: usize) -> Result<Vec<ScoredPath>, KnowledgeError> {
            self.0
                .clone()
                .map_err(|_| KnowledgeError::Embedding("model missing".to_string()))
        }
    }

    fn retriever(failing: Option<EntityTable>, stalling: Option<EntityTable>) -> HybridRetriever {
        let config = SearchConfig {
            index_timeout_ms: 50,
            ..SearchConfig::default()
        };
        HybridRetriever::new(Arc::new(FixedStore { failing, stalling }), config)
    }

    fn paths(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.file_path.as_str()).collect()
    }

    #[tokio::test]
    async fn test_failing_index_is_skipped() {
        let hits = retriever(Some(EntityTable::Class), None).search("q", 10).await;
        assert_eq!(
            hits,
            vec![
                SearchHit { file_path: "f1".into(), score: 8.0, rank: 1 },
                SearchHit { file_path: "f2".into(), score: 2.0, rank: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_stalled_index_times_out() {
        let hits = retriever(None, Some(EntityTable::Class)).search("q", 10).await;
        assert_eq!(paths(&hits), vec!["f1", "f2"]);
    }

    #[tokio::test]
    async fn test_keyword_only_without_semantic_source() {
        let hits = retriever(None, None).search("q", 2).await;
        assert_eq!(paths(&hits), vec!["f3", "f1"]);
        assert_eq!(hits[0].score, 10.0);
    }

    #[tokio::test]
    async fn test_failed_semantic_source_degrades_to_keyword() {
        let retriever = retriever(None, None).with_semantic(Arc::new(FixedSemantic(Err(()))));
        let hits = retriever.search("q", 10).await;
        assert_eq!(paths(&hits), vec!["f3", "f1", "f2"]);
    }

    #[tokio::test]
    async fn test_semantic_results_are_fused() {
        let config = SearchConfig {
            fusion: FusionStrategy::Rrf,
            keyword_weight: 1.0,
            semantic_weight: 1.0,
            ..SearchConfig::default()
        };
        let retriever = HybridRetriever::new(
            Arc::new(FixedStore { failing: None, stalling: None }),
            config,
        )
        .with_semantic(Arc::new(FixedSemantic(Ok(vec![
            ScoredPath::new("f2", 0.9),
            ScoredPath::new("f4", 0.8),
        ]))));

        let hits = retriever.search("q", 10).await;
        // f2 is third by keyword but first semantically.
        assert_eq!(hits[0].file_path, "f2");
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().enumerate().all(|(i, h)| h.rank == i + 1));
    }
}
