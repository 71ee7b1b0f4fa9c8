pub mod knowledge_base;
pub mod sql_query;
pub mod web_search;

pub use knowledge_base::KnowledgeBaseTool;
pub use sql_query::{SqlQueryTool, SqlToolSettings};
pub use web_search::WebSearchTool;
