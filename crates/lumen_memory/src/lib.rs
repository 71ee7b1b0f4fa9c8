pub mod analytics;
pub mod database;
pub mod embedding;
pub mod ingestion;
pub mod splitter;
pub mod sqlite;

pub use analytics::SqliteAnalytics;
pub use database::SqliteDatabase;
pub use embedding::{cosine_similarity, embedder_for, Embedder, Embedding, FastEmbedder, HashingEmbedder};
pub use ingestion::{IngestError, IngestReport, Ingestor};
pub use splitter::TextSplitter;
pub use sqlite::SqliteKnowledgeBase;
