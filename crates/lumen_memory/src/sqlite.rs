use crate::embedding::{cosine_similarity, Embedder, Embedding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lumen_core::{DocumentChunk, KnowledgeBase};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use std::sync::Arc;

/// Open (creating if needed) a SQLite database file as a pool.
pub async fn open_pool<P: AsRef<Path>>(db_path: P) -> Result<Pool<Sqlite>> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
    connect(&db_url, false).await
}

/// Connect to a SQLite URL. `read_only` forces `mode=ro` on the URL.
pub async fn connect(db_url: &str, read_only: bool) -> Result<Pool<Sqlite>> {
    let url = if read_only { with_mode(db_url, "ro") } else { db_url.to_string() };
    SqlitePoolOptions::new()
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .with_context(|| format!("Failed to connect to SQLite database {url}"))
}

fn with_mode(url: &str, mode: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((b, q)) => (b, q),
        None => (url, ""),
    };
    let mut params: Vec<&str> = query
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("mode="))
        .collect();
    let mode_param = format!("mode={mode}");
    params.push(&mode_param);
    format!("{}?{}", base, params.join("&"))
}

/// Document-chunk index with brute-force cosine search over stored embeddings.
#[derive(Clone)]
pub struct SqliteKnowledgeBase {
    pool: Pool<Sqlite>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteKnowledgeBase {
    pub async fn new<P: AsRef<Path>>(db_path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = open_pool(db_path).await?;
        let kb = Self { pool, embedder };
        kb.migrate().await?;
        Ok(kb)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create chunks table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create chunks doc index")?;

        Ok(())
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding> {
        let embedder = self.embedder.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .context("Embedding task panicked")?
    }

    async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let embedder = self.embedder.clone();
        tokio::task::spawn_blocking(move || embedder.embed_batch(texts))
            .await
            .context("Embedding task panicked")?
    }
}

#[async_trait]
impl KnowledgeBase for SqliteKnowledgeBase {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>> {
        if k == 0 {
            return Ok(vec![]);
        }
        let query_embedding = self.embed_one(query).await.context("Failed to embed query")?;

        let rows = sqlx::query("SELECT doc_id, filename, chunk_index, content, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch chunks for vector search")?;

        let mut scored: Vec<DocumentChunk> = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let embedding: Embedding = match bincode::deserialize(&blob) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("Skipping chunk with undecodable embedding: {}", e);
                    continue;
                }
            };
            let chunk_index: i64 = row.get("chunk_index");
            scored.push(DocumentChunk {
                doc_id: row.get("doc_id"),
                filename: row.get("filename"),
                chunk_index: chunk_index as usize,
                content: row.get("content"),
                score: Some(cosine_similarity(&query_embedding, &embedding)),
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn add_chunks(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let embeddings = self
            .embed_many(chunks.iter().map(|c| c.content.clone()).collect())
            .await
            .context("Failed to embed chunks")?;
        anyhow::ensure!(
            embeddings.len() == chunks.len(),
            "Embedder returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        );

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let blob = bincode::serialize(&embedding).context("Failed to serialize embedding")?;
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks (id, doc_id, filename, chunk_index, content, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(format!("{}:{}", chunk.doc_id, chunk.chunk_index))
            .bind(&chunk.doc_id)
            .bind(&chunk.filename)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(blob)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to insert chunk")?;
        }
        tx.commit().await?;

        tracing::debug!("Stored {} chunks", chunks.len());
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn chunk(doc_id: &str, filename: &str, index: usize, content: &str) -> DocumentChunk {
        DocumentChunk {
            doc_id: doc_id.into(),
            filename: filename.into(),
            chunk_index: index,
            content: content.into(),
            score: None,
        }
    }

    async fn test_kb(dir: &tempfile::TempDir) -> SqliteKnowledgeBase {
        SqliteKnowledgeBase::new(dir.path().join("kb.db"), Arc::new(HashingEmbedder::default()))
            .await
            .unwrap()
    }

    #[test]
    fn test_with_mode_rewrites_query() {
        assert_eq!(with_mode("sqlite://a.db", "ro"), "sqlite://a.db?mode=ro");
        assert_eq!(with_mode("sqlite://a.db?mode=rwc", "ro"), "sqlite://a.db?mode=ro");
        assert_eq!(
            with_mode("sqlite://a.db?cache=shared", "ro"),
            "sqlite://a.db?cache=shared&mode=ro"
        );
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let kb = test_kb(&dir).await;
        let hits = kb.similarity_search("anything", 4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_search_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let kb = test_kb(&dir).await;
        let written = kb
            .add_chunks(&[
                chunk("d1", "cats.pdf", 0, "cats purr and sleep in the sun"),
                chunk("d2", "rust.pdf", 0, "rust borrow checker enforces ownership rules"),
                chunk("d2", "rust.pdf", 1, "lifetimes describe how long references live"),
            ])
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(kb.chunk_count().await.unwrap(), 3);

        let hits = kb.similarity_search("rust ownership borrow checker", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].filename, "rust.pdf");
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score.unwrap() >= hits[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_add_same_chunk_twice_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let kb = test_kb(&dir).await;
        kb.add_chunks(&[chunk("d1", "a.txt", 0, "first")]).await.unwrap();
        kb.add_chunks(&[chunk("d1", "a.txt", 0, "second")]).await.unwrap();
        assert_eq!(kb.chunk_count().await.unwrap(), 1);
        let hits = kb.similarity_search("second", 1).await.unwrap();
        assert_eq!(hits[0].content, "second");
    }

    #[tokio::test]
    async fn test_zero_k_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let kb = test_kb(&dir).await;
        kb.add_chunks(&[chunk("d1", "a.txt", 0, "text")]).await.unwrap();
        assert!(kb.similarity_search("text", 0).await.unwrap().is_empty());
    }
}
