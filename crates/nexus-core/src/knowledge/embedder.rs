//! Embedding generation for semantic search.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use super::error::KnowledgeError;
use super::graph::GraphSnapshot;
use super::search::SemanticSearch;
use super::store::{ChunkRecord, ScoredPath, SurrealStore};

/// Symbol snippets embedded per model call.
const BATCH_SIZE: usize = 64;

/// Longest text handed to the model, in characters.
const MAX_CHUNK_CHARS: usize = 2000;

/// Trait for embedding generation.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of text.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// FastEmbed-based embedder using BGE-Small model.
pub struct FastEmbedder {
    model: TextEmbedding,
    dimension: usize,
    model_name: String,
}

impl FastEmbedder {
    /// Default model with its weights cached in `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> Result<Self, KnowledgeError> {
        Self::with_model_and_cache(EmbeddingModel::BGESmallENV15, cache_dir)
    }

    pub fn with_model_and_cache(
        model: EmbeddingModel,
        cache_dir: PathBuf,
    ) -> Result<Self, KnowledgeError> {
        let model_name = format!("{:?}", model);

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            KnowledgeError::Embedding(format!("Failed to create cache directory: {}", e))
        })?;

        let text_embedding = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;

        // Measure the output width once.
        let sample = text_embedding
            .embed(vec!["width"], None)
            .map_err(|e| KnowledgeError::Embedding(e.to_string()))?;
        let dimension = sample.first().map(|v| v.len()).unwrap_or(384);

        Ok(Self {
            model: text_embedding,
            dimension,
            model_name,
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts_vec: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();

        self.model
            .embed(texts_vec, None)
            .map_err(|e| KnowledgeError::Embedding(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Semantic search over symbol embeddings kept in the SurrealDB store.
pub struct EmbeddingSearch {
    embedder: Arc<dyn Embedder>,
    store: Arc<SurrealStore>,
}

impl EmbeddingSearch {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<SurrealStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed every symbol of `snapshot` and replace the stored chunks.
    ///
    /// Returns the number of chunks stored.
    pub async fn index_snapshot(&self, snapshot: &GraphSnapshot) -> Result<usize, KnowledgeError> {
        let pending: Vec<(String, String, String)> = snapshot
            .symbols
            .iter()
            .map(|s| (s.id.clone(), s.file_path.clone(), chunk_text(&s.name, &s.snippet)))
            .collect();

        let mut chunks = Vec::with_capacity(pending.len());
        for batch in pending.chunks(BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(_, _, text)| text.clone()).collect();
            let embeddings = self.embed_blocking(texts).await?;

            for ((entity_id, file_path, content), embedding) in batch.iter().cloned().zip(embeddings) {
                chunks.push(ChunkRecord { entity_id, file_path, content, embedding });
            }
            debug!(done = chunks.len(), total = pending.len(), "embedded batch");
        }

        let count = chunks.len();
        self.store.store_embeddings(chunks).await?;
        info!(count, model = self.embedder.model_name(), "stored symbol embeddings");
        Ok(count)
    }

    /// Run the model off the async executor.
    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed(&texts))
            .await
            .map_err(|e| KnowledgeError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SemanticSearch for EmbeddingSearch {
    async fn query_similar(&self, query: &str, limit: usize) -> Result<Vec<ScoredPath>, KnowledgeError> {
        let mut embeddings = self.embed_blocking(vec![query.to_string()]).await?;
        let embedding = embeddings
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("model returned no embedding".to_string()))?;
        self.store.search_by_embedding(&embedding, limit).await
    }
}

/// Text embedded for one symbol: its name, then its snippet, cut to size.
fn chunk_text(name: &str, snippet: &str) -> String {
    let text = format!("{}\n{}", name, snippet);
    match text.char_indices().nth(MAX_CHUNK_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}
