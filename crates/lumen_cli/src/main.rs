mod bootstrap;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lumen_core::LumenConfig;
use lumen_gateway::{AppState, GatewayServer};
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "lumen", author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "LUMEN_CONFIG", default_value = "lumen.toml", global = true)]
    config: PathBuf,

    /// Log filter, e.g. "debug" or "lumen_reasoning=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Also write daily rolling log files into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,

    /// Answer a single query and exit
    Ask {
        query: String,

        /// Session id recorded with the query
        #[arg(long, default_value = "cli")]
        session: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop
    Chat {
        #[arg(long, default_value = "cli")]
        session: String,
    },

    /// Add text documents to the knowledge base
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print aggregate usage analytics as JSON
    Analytics,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = logging::init(&logging::LogOptions {
        level: cli.log_level.clone(),
        json: cli.log_json,
        dir: cli.log_dir.clone(),
    })?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Ask { query, session, json } => ask(&config, &query, &session, json).await,
        Command::Chat { session } => chat(&config, &session).await,
        Command::Ingest { paths } => ingest(&config, &paths).await,
        Command::Analytics => analytics(&config).await,
    }
}

/// A missing file means defaults; an unreadable or malformed one is an error.
fn load_config(path: &Path) -> Result<LumenConfig> {
    if path.exists() {
        info!("Loading config from {}", path.display());
        LumenConfig::load(path)
    } else {
        Ok(LumenConfig::load_or_default(path))
    }
}

async fn serve(config: &LumenConfig) -> Result<()> {
    let services = bootstrap::services(config).await?;
    let state = AppState::new(services.engine, services.ingestor);
    let server = GatewayServer::new(state, &config.server.host, config.server.port);

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn ask(config: &LumenConfig, query: &str, session: &str, json: bool) -> Result<()> {
    let services = bootstrap::services(config).await?;
    let outcome = services.engine.query(query, session).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!("{}", outcome.answer);
    if !outcome.tool_used.is_empty() {
        println!("\n[tools: {}]", outcome.tool_used.join(", "));
    }
    if !outcome.sources.is_empty() {
        println!("[sources: {}]", outcome.sources.join(", "));
    }
    Ok(())
}

async fn chat(config: &LumenConfig, session: &str) -> Result<()> {
    let services = bootstrap::services(config).await?;
    let mut editor = rustyline::DefaultEditor::new().context("Failed to start line editor")?;
    println!("Lumen ready. Type 'quit' to exit.");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        match services.engine.query(trimmed, session).await {
            Ok(outcome) => {
                println!("\nLumen: {}\n", outcome.answer);
                if !outcome.tool_used.is_empty() {
                    println!("[tools: {}]\n", outcome.tool_used.join(", "));
                }
            }
            Err(e) => {
                error!("Query failed: {}", e);
                println!("\n[Error]: {}\n", e);
            }
        }
    }
    Ok(())
}

async fn ingest(config: &LumenConfig, paths: &[PathBuf]) -> Result<()> {
    let kb = bootstrap::knowledge_base(config).await?;
    let ingestor = bootstrap::ingestor(config, kb);

    for path in paths {
        let report = ingestor.ingest_file(path).await?;
        println!(
            "Ingested {}: {} chunks (doc {})",
            report.filename, report.chunks_created, report.doc_id
        );
    }
    Ok(())
}

async fn analytics(config: &LumenConfig) -> Result<()> {
    use lumen_core::AnalyticsRecorder;

    let store = lumen_memory::SqliteAnalytics::new(&config.analytics.db_path).await?;
    let report = store.report().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
