use anyhow::Result;
use fastembed::{EmbeddingModel as FastEmbedModel, InitOptions, TextEmbedding};
use lumen_core::config::EmbeddingModelKind;
use std::sync::Arc;

pub type Embedding = Vec<f32>;

/// Turns text into dense vectors for similarity search.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;

    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Build the embedder selected in config.
pub fn embedder_for(kind: EmbeddingModelKind) -> Result<Arc<dyn Embedder>> {
    Ok(match kind {
        EmbeddingModelKind::AllMiniLmL6V2 => Arc::new(FastEmbedder::new()?),
        EmbeddingModelKind::Hashing => Arc::new(HashingEmbedder::default()),
    })
}

#[derive(Clone)]
pub struct FastEmbedder {
    model: Arc<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new() -> Result<Self> {
        // sentence-transformers/all-MiniLM-L6-v2, 384 dims
        let mut options = InitOptions::default();
        options.model_name = FastEmbedModel::AllMiniLML6V2;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options)?;

        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.model.embed(vec![text], None)?;
        // embed returns Vec<Embedding>, we just want the first one
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to generate embedding"))
    }

    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let embeddings = self.model.embed(texts, None)?;
        Ok(embeddings)
    }
}

/// Feature-hashing bag-of-words embedder. Deterministic across runs and
/// platforms, needs no model files; retrieval quality is lexical only.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.to_lowercase().as_bytes());
            let idx = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Calculate cosine similarity between two vectors
/// Returns a value between -1.0 and 1.0 (1.0 = identical direction)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
