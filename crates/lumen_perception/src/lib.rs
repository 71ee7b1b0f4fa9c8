pub mod tavily;

pub use tavily::TavilyClient;
