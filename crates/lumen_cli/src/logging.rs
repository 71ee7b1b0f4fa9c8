use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub struct LogOptions {
    /// Filter directive; `RUST_LOG` then `info` when absent.
    pub level: Option<String>,
    pub json: bool,
    /// Directory for a daily rolling `lumen.log`.
    pub dir: Option<PathBuf>,
}

/// Install the global subscriber. Console output goes to stderr so command
/// output on stdout stays clean. Keep the returned guard alive for the file
/// writer to flush.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let filter = match &options.level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let (file_layer, guard) = match &options.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "lumen.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = options
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!options.json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
