use lumen_memory::IngestReport;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/agent/query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default".to_string()
}

/// Body returned by `POST /api/v1/documents/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub doc_id: String,
    pub filename: String,
    pub chunks_created: usize,
    pub status: String,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            doc_id: report.doc_id,
            filename: report.filename,
            chunks_created: report.chunks_created,
            status: "success".to_string(),
        }
    }
}
