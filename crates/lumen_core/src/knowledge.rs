use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrievable piece of an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier of the document this chunk was cut from.
    pub doc_id: String,
    /// Original filename of the document.
    pub filename: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    pub content: String,
    /// Similarity to the query, set only on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Externally populated document index consulted by the knowledge-base tool.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Return up to `k` chunks in descending relevance order.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>>;

    /// Store chunks (embedding them as needed). Returns how many were written.
    async fn add_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize>;
}
