use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single hit from an external search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub content: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Hits in the provider's ranking order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}
