//! Wires configured services together: storage, model, tools, analytics.

use anyhow::{Context, Result};
use lumen_core::config::LlmConfig;
use lumen_core::LumenConfig;
use lumen_memory::{embedder_for, Ingestor, SqliteAnalytics, SqliteDatabase, SqliteKnowledgeBase};
use lumen_perception::TavilyClient;
use lumen_reasoning::llm::{CompletionParams, LlmClient};
use lumen_reasoning::providers::{MockProvider, OpenAiClient};
use lumen_reasoning::tools::{KnowledgeBaseTool, SqlQueryTool, SqlToolSettings, WebSearchTool};
use lumen_reasoning::{AgentSettings, Orchestrator, RagEngine, ToolRegistry};
use std::sync::Arc;

pub struct Services {
    pub engine: Arc<RagEngine>,
    pub ingestor: Arc<Ingestor>,
}

pub async fn services(config: &LumenConfig) -> Result<Services> {
    let kb = knowledge_base(config).await?;
    let llm = llm_client(&config.llm)?;
    let registry = tool_registry(config, kb.clone(), llm.clone()).await?;

    let orchestrator = Orchestrator::new(llm, registry, AgentSettings::from_config(&config.agent, &config.llm));
    let analytics = SqliteAnalytics::new(&config.analytics.db_path)
        .await
        .context("Failed to open analytics store")?;
    let engine = RagEngine::new(orchestrator).with_recorder(Arc::new(analytics));

    Ok(Services {
        engine: Arc::new(engine),
        ingestor: Arc::new(ingestor(config, kb)),
    })
}

pub async fn knowledge_base(config: &LumenConfig) -> Result<Arc<SqliteKnowledgeBase>> {
    let embedder = embedder_for(config.knowledge_base.embedding_model).context("Failed to load embedding model")?;
    let kb = SqliteKnowledgeBase::new(&config.knowledge_base.db_path, embedder)
        .await
        .context("Failed to open knowledge base")?;
    tracing::info!("Knowledge base at {}", config.knowledge_base.db_path.display());
    Ok(Arc::new(kb))
}

pub fn ingestor(config: &LumenConfig, kb: Arc<SqliteKnowledgeBase>) -> Ingestor {
    Ingestor::new(kb, config.knowledge_base.chunk_size, config.knowledge_base.chunk_overlap)
}

pub fn llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    tracing::info!("LLM provider {} ({})", config.provider, config.model);
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(&config.model))),
        "openai" | "openrouter" => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        other => anyhow::bail!("Unknown LLM provider '{}' (expected openai or mock)", other),
    }
}

/// Register a tool for every configured backing service.
async fn tool_registry(
    config: &LumenConfig,
    kb: Arc<SqliteKnowledgeBase>,
    llm: Arc<dyn LlmClient>,
) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(KnowledgeBaseTool::new(kb, config.knowledge_base.top_k)))?;

    if config.web_search.enabled {
        match TavilyClient::from_config(&config.web_search)? {
            Some(client) => registry.register(Box::new(WebSearchTool::new(
                Arc::new(client),
                config.web_search.max_results,
            )))?,
            None => tracing::warn!("TAVILY_API_KEY not set, web search disabled"),
        }
    }

    if config.sql_tool.enabled {
        match &config.sql_tool.database_url {
            Some(url) => {
                let db = SqliteDatabase::connect(
                    url,
                    config.sql_tool.read_only,
                    config.sql_tool.allowed_tables.clone(),
                )
                .await
                .context("Failed to connect SQL tool database")?;
                registry.register(Box::new(SqlQueryTool::new(
                    Arc::new(db),
                    llm,
                    CompletionParams::from(&config.llm),
                    SqlToolSettings::from(&config.sql_tool),
                )))?;
            }
            None => tracing::info!("No SQL tool database configured, SQL tool disabled"),
        }
    }

    tracing::info!("Tools registered: {:?}", registry.kinds());
    Ok(registry)
}
