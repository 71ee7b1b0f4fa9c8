use anyhow::{Context, Result};
use async_trait::async_trait;
use lumen_core::config::WebSearchConfig;
use lumen_core::{SearchHit, WebSearch};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Client for the Tavily search API.
pub struct TavilyClient {
    endpoint: Url,
    api_key: String,
    search_depth: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: &str, search_depth: &str) -> Result<Self> {
        let mut base = Url::parse(base_url).with_context(|| format!("Invalid search base URL: {base_url}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("search")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint,
            api_key: api_key.to_string(),
            search_depth: search_depth.to_string(),
            client,
        })
    }

    /// Build from config, or `None` when no API key is set.
    pub fn from_config(config: &WebSearchConfig) -> Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Ok(Some(Self::new(&config.base_url, &key, &config.search_depth)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: &self.search_depth,
            include_answer: true,
            include_raw_content: true,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .context("Failed to reach search provider")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Search provider returned {}: {}", status, text);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;
        tracing::debug!("Search for {:?} returned {} results", query, parsed.results.len());

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                url: r.url.unwrap_or_else(|| "N/A".to_string()),
                title: r.title.unwrap_or_else(|| "N/A".to_string()),
                content: r.content.unwrap_or_else(|| "N/A".to_string()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_parses_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({
                "api_key": "tvly-test",
                "query": "rust 2024 edition",
                "max_results": 3,
                "search_depth": "advanced"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "ignored",
                "results": [
                    {"url": "https://blog.rust-lang.org", "title": "Rust Blog", "content": "Edition news"},
                    {"url": "https://example.com", "content": "No title here"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = TavilyClient::new(&mock_server.uri(), "tvly-test", "advanced").unwrap();
        let hits = client.search("rust 2024 edition", 3).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://blog.rust-lang.org");
        assert_eq!(hits[0].title, "Rust Blog");
        assert_eq!(hits[1].title, "N/A");
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&mock_server)
            .await;

        let client = TavilyClient::new(&mock_server.uri(), "bad", "basic").unwrap();
        let err = client.search("anything", 3).await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[test]
    fn test_endpoint_joins_base_path() {
        let c = TavilyClient::new("https://api.tavily.com", "k", "basic").unwrap();
        assert_eq!(c.endpoint.as_str(), "https://api.tavily.com/search");
        let c = TavilyClient::new("http://proxy.local/tavily", "k", "basic").unwrap();
        assert_eq!(c.endpoint.as_str(), "http://proxy.local/tavily/search");
        assert!(TavilyClient::new("not a url", "k", "basic").is_err());
    }
}
