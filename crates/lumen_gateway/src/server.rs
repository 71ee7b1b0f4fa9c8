use crate::error::ApiError;
use crate::types::{QueryRequest, UploadResponse};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use lumen_core::AnalyticsReport;
use lumen_memory::Ingestor;
use lumen_reasoning::{QueryOutcome, RagEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<RagEngine>,
    ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(engine: Arc<RagEngine>, ingestor: Arc<Ingestor>) -> Self {
        Self { engine, ingestor }
    }
}

/// Build the API router.
///
/// - `GET /` and `GET /health`
/// - `POST /api/v1/agent/query`
/// - `POST /api/v1/documents/upload` (multipart field `file`)
/// - `GET /api/v1/agent/analytics`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/agent/query", post(query))
        .route("/api/v1/agent/analytics", get(analytics))
        .route(
            "/api/v1/documents/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The HTTP server bound to one address.
pub struct GatewayServer {
    state: AppState,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(state: AppState, host: &str, port: u16) -> Self {
        Self {
            state,
            host: host.to_string(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Serve until the listener fails or the task is cancelled.
    pub async fn run(self) -> anyhow::Result<()> {
        use anyhow::Context;

        let addr = self.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Gateway failed to bind {}", addr))?;
        tracing::info!("Gateway listening on {}", addr);
        axum::serve(listener, router(self.state))
            .await
            .context("Gateway server error")
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Lumen RAG Agent API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// POST /api/v1/agent/query: run one query through the agent.
async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    tracing::info!("Query received (session {})", req.session_id);
    let outcome = state.engine.query(&req.query, &req.session_id).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/documents/upload: chunk and index one text document.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        file = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = file else {
        return Err(ApiError::Validation("No file provided".into()));
    };
    tracing::info!("Upload received: {} ({} bytes)", filename, bytes.len());
    let report = state.ingestor.ingest_bytes(&filename, bytes.to_vec()).await?;
    Ok(Json(report.into()))
}

/// GET /api/v1/agent/analytics
async fn analytics(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, ApiError> {
    let report = state
        .engine
        .analytics()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to load analytics: {:#}", e)))?;
    Ok(Json(report))
}
