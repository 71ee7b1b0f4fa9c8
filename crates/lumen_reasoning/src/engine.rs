use crate::agent_loop::{Orchestrator, ReasoningError};
use crate::analytics::summarize;
use lumen_core::{AnalyticsRecorder, AnalyticsReport, QueryRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a caller gets back for one answered query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub answer: String,
    /// Distinct tool names, first-seen order.
    pub tool_used: Vec<String>,
    /// Knowledge-base document ids the answer drew on.
    pub sources: Vec<String>,
    pub reasoning_steps: usize,
}

/// Query service: runs the reasoning loop and records analytics.
pub struct RagEngine {
    orchestrator: Orchestrator,
    recorder: Option<Arc<dyn AnalyticsRecorder>>,
}

impl RagEngine {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn AnalyticsRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answer one query. Each call starts from a fresh conversation;
    /// `session_id` is only passed through to analytics. The outcome echoes
    /// `query` as given; the model sees it trimmed.
    #[tracing::instrument(skip(self, query))]
    pub async fn query(&self, query: &str, session_id: &str) -> Result<QueryOutcome, ReasoningError> {
        if query.trim().is_empty() {
            return Err(ReasoningError::InvalidQuery("query must not be empty".into()));
        }

        let state = self.orchestrator.run(query.trim()).await?;
        let summary = summarize(&state);
        let answer = state.answer().unwrap_or_default().to_string();

        if let Some(recorder) = &self.recorder {
            let record = QueryRecord {
                session_id: session_id.to_string(),
                query: query.to_string(),
                answer: answer.clone(),
                summary: summary.clone(),
            };
            if let Err(e) = recorder.record(&record).await {
                tracing::warn!("Failed to record analytics: {:#}", e);
            }
        }

        Ok(QueryOutcome {
            query: query.to_string(),
            answer,
            tool_used: summary.distinct_tools,
            sources: state.sources().to_vec(),
            reasoning_steps: summary.reasoning_steps,
        })
    }

    /// Aggregate analytics; empty when no recorder is configured.
    pub async fn analytics(&self) -> anyhow::Result<AnalyticsReport> {
        match &self.recorder {
            Some(recorder) => recorder.report().await,
            None => Ok(AnalyticsReport::default()),
        }
    }
}
