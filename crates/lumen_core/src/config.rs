use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub web_search: WebSearchConfig,
    pub sql_tool: SqlToolConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerConfig,
}

impl LumenConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: LumenConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("MODEL_NAME") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        override_parsed("LLM_TEMPERATURE", &mut self.llm.temperature);
        override_parsed("LLM_MAX_TOKENS", &mut self.llm.max_tokens);
        override_parsed("AGENT_MAX_TURNS", &mut self.agent.max_turns);
        override_parsed("SIMILARITY_SEARCH_K", &mut self.knowledge_base.top_k);
        override_parsed("WEB_SEARCH_MAX_RESULTS", &mut self.web_search.max_results);
        if let Ok(v) = std::env::var("SQL_TOOL_DATABASE_URL") {
            self.sql_tool.database_url = Some(v);
        }
        override_bool("SQL_TOOL_ENABLED", &mut self.sql_tool.enabled);
        override_bool("SQL_TOOL_READ_ONLY", &mut self.sql_tool.read_only);
        if let Ok(v) = std::env::var("SERVER_HOST") {
            self.server.host = v;
        }
        override_parsed("SERVER_PORT", &mut self.server.port);
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(var) {
        match v.parse() {
            Ok(n) => *slot = n,
            Err(_) => tracing::warn!("Ignoring unparsable {}={:?}", var, v),
        }
    }
}

/// Unrecognized values keep the current setting.
fn override_bool(var: &str, slot: &mut bool) {
    if let Ok(v) = std::env::var(var) {
        match parse_bool(&v) {
            Some(b) => *slot = b,
            None => tracing::warn!("Ignoring unrecognized boolean {}={:?}", var, v),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint, e.g. OpenRouter) or "mock".
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// API key from the environment; never read from the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var("OPENROUTER_API_KEY")
            .or_else(|_| std::env::var("LLM_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on model turns per query.
    pub max_turns: usize,
    pub tool_timeout_secs: u64,
    pub llm_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            tool_timeout_secs: 60,
            llm_timeout_secs: 120,
        }
    }
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub db_path: PathBuf,
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_model: EmbeddingModelKind,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("knowledge.db"),
            top_k: 4,
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_model: EmbeddingModelKind::AllMiniLmL6V2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModelKind {
    #[default]
    AllMiniLmL6V2,
    /// Deterministic feature hashing; no model download.
    Hashing,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub max_results: usize,
    pub base_url: String,
    pub search_depth: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: 3,
            base_url: "https://api.tavily.com".to_string(),
            search_depth: "advanced".to_string(),
        }
    }
}

impl WebSearchConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlToolConfig {
    pub enabled: bool,
    /// e.g. `sqlite://data/shop.db`. The tool is not registered without one.
    pub database_url: Option<String>,
    /// Only statements starting with SELECT may run.
    pub read_only: bool,
    /// Tables exposed in the schema description. Empty = all.
    pub allowed_tables: Vec<String>,
    /// Rows retained from a result set.
    pub max_rows: usize,
    /// Rows rendered inline in the tool result.
    pub preview_rows: usize,
}

impl Default for SqlToolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_url: None,
            read_only: true,
            allowed_tables: vec![],
            max_rows: 100,
            preview_rows: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub db_path: PathBuf,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("analytics.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
