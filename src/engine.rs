//! Ingestion and retrieval orchestration.
//!
//! [`RetrievalEngine`] is the sole entry point the surrounding application
//! uses: [`ingest`](RetrievalEngine::ingest) runs extraction → chunking →
//! embedding → store insertion → persistence for one document, and
//! [`retrieve_context`](RetrievalEngine::retrieve_context) assembles the
//! nearest chunk texts for a query.
//!
//! The store sits behind a `tokio::sync::RwLock`: `add` + `persist` run under
//! a single write guard so the index and metadata appends are never observed
//! half-applied, while searches share a read guard and may run concurrently
//! with each other.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::RetrievalError;
use crate::extract;
use crate::models::ChunkMetadata;
use crate::store::VectorStore;

/// Shared handle to the engine. Constructed once and cloned freely.
pub type SharedEngine = Arc<RetrievalEngine>;

/// Orchestrates document ingestion and query-time context retrieval over one
/// vector store.
pub struct RetrievalEngine {
    config: Config,
    provider: Box<dyn EmbeddingProvider>,
    store: RwLock<VectorStore>,
}

impl RetrievalEngine {
    /// Build an engine from configuration: constructs the embedding provider
    /// and loads (or creates) the vector store at the configured location.
    ///
    /// Fails on load-time index corruption — a detected inconsistency is
    /// never papered over with an empty index.
    pub fn open(config: Config) -> Result<SharedEngine> {
        let provider = embedding::create_provider(&config.embedding)?;
        Self::new(config, provider)
    }

    /// Build an engine with an injected provider (tests, custom backends).
    pub fn new(config: Config, provider: Box<dyn EmbeddingProvider>) -> Result<SharedEngine> {
        let store = VectorStore::open(&config.index.dir, config.embedding.dims)
            .with_context(|| format!("Failed to open index at {}", config.index.dir.display()))?;
        info!(
            records = store.len(),
            dims = store.dims(),
            dir = %config.index.dir.display(),
            "vector store ready"
        );
        Ok(Arc::new(Self {
            config,
            provider,
            store: RwLock::new(store),
        }))
    }

    /// Number of records currently in the store.
    pub async fn record_count(&self) -> usize {
        self.store.read().await.len()
    }

    /// Ingest one document file into the store.
    ///
    /// Returns `true` when the document's chunks were embedded, added, and
    /// persisted; `false` when the extracted text is empty or any pipeline
    /// step failed. A failure never partially commits: the store's batch
    /// append is atomic and persistence only runs after a successful append.
    ///
    /// Re-ingesting the same document appends a second, independent set of
    /// records — deduplication is the caller's concern.
    pub async fn ingest(&self, document_id: i64, path: &Path) -> bool {
        match self.run_ingest(document_id, path).await {
            Ok(ingested) => ingested,
            Err(e) => {
                error!(document_id, path = %path.display(), error = %e, "ingestion failed");
                false
            }
        }
    }

    async fn run_ingest(&self, document_id: i64, path: &Path) -> Result<bool> {
        let text = extract::extract_file(path)?;
        if text.is_empty() {
            warn!(document_id, path = %path.display(), "document yielded no text");
            return Ok(false);
        }

        let chunks = chunk_text(
            &text,
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        if chunks.is_empty() {
            return Ok(false);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embed_batched(&texts)
            .await
            .map_err(|e| RetrievalError::Provider(e.to_string()))?;

        let metadata: Vec<ChunkMetadata> = chunks
            .iter()
            .map(|chunk| ChunkMetadata::from_chunk(document_id, chunk))
            .collect();

        // Critical section: the paired append and the re-serialization must
        // not interleave with another writer.
        {
            let mut store = self.store.write().await;
            store.add(&vectors, metadata)?;
            store.persist()?;
        }

        info!(document_id, chunks = chunks.len(), "document ingested");
        Ok(true)
    }

    /// Embed texts in batches of the configured size, preserving input order.
    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embedding.batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.provider.embed(batch).await?);
        }
        Ok(vectors)
    }

    /// Retrieve the `k` nearest chunk texts for a query, joined nearest-first
    /// by a blank line.
    ///
    /// An empty string means "no relevant context" — an empty store is not an
    /// error, and callers branch on emptiness.
    pub async fn retrieve_context(&self, query: &str, k: usize) -> Result<String> {
        {
            let store = self.store.read().await;
            if store.is_empty() {
                return Ok(String::new());
            }
        }

        let query_vector = embedding::embed_query(self.provider.as_ref(), query)
            .await
            .map_err(|e| RetrievalError::Provider(e.to_string()))?;

        let store = self.store.read().await;
        let hits = store.search(&query_vector, k)?;
        debug!(query_len = query.len(), hits = hits.len(), "search complete");

        let parts: Vec<&str> = hits
            .iter()
            .map(|hit| hit.metadata.text.as_str())
            .filter(|text| !text.is_empty())
            .collect();

        Ok(parts.join("\n\n"))
    }

    /// Retrieve using the configured default result count.
    pub async fn retrieve_context_default(&self, query: &str) -> Result<String> {
        self.retrieve_context(query, self.config.retrieval.default_k)
            .await
    }

    /// Persist the current store state (used by `rag init` to materialize
    /// empty artifacts).
    pub async fn persist(&self) -> Result<()> {
        self.store.read().await.persist()?;
        Ok(())
    }
}
