use crate::splitter::TextSplitter;
use lumen_core::{DocumentChunk, KnowledgeBase};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("document '{0}' contains no text")]
    EmptyDocument(String),
    #[error("document '{0}' is not UTF-8 text")]
    NotText(String),
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to store chunks: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Outcome of ingesting a single document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub filename: String,
    pub chunks_created: usize,
}

/// Chunks documents and writes them into the knowledge base.
pub struct Ingestor {
    knowledge_base: Arc<dyn KnowledgeBase>,
    splitter: TextSplitter,
}

impl Ingestor {
    pub fn new(knowledge_base: Arc<dyn KnowledgeBase>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            knowledge_base,
            splitter: TextSplitter::new(chunk_size, chunk_overlap),
        }
    }

    pub async fn ingest(&self, filename: &str, text: &str) -> Result<IngestReport, IngestError> {
        let pieces = self.splitter.split(text);
        if pieces.is_empty() {
            return Err(IngestError::EmptyDocument(filename.to_string()));
        }

        let doc_id = Uuid::new_v4().to_string();
        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| DocumentChunk {
                doc_id: doc_id.clone(),
                filename: filename.to_string(),
                chunk_index,
                content,
                score: None,
            })
            .collect();

        let chunks_created = self.knowledge_base.add_chunks(&chunks).await?;
        tracing::info!(
            "Ingested '{}' as {} ({} chunks)",
            filename,
            doc_id,
            chunks_created
        );

        Ok(IngestReport {
            doc_id,
            filename: filename.to_string(),
            chunks_created,
        })
    }

    pub async fn ingest_bytes(&self, filename: &str, bytes: Vec<u8>) -> Result<IngestReport, IngestError> {
        let text = String::from_utf8(bytes).map_err(|_| IngestError::NotText(filename.to_string()))?;
        self.ingest(filename, &text).await
    }

    pub async fn ingest_file<P: AsRef<Path>>(&self, path: P) -> Result<IngestReport, IngestError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| IngestError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.ingest_bytes(&filename, bytes).await
    }
}
