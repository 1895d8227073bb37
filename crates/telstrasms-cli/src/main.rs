//! telstrasms - a terminal client for the Telstra Messaging API.
//!
//! Choose or enter an API key pair, get a number, send messages, and poll
//! for replies, which are listed in a table.

mod app;
mod render;

use std::io;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use telstrasms_core::config::Config;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "telstrasms.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when the cache directory is available, to a daily
/// log file. The returned guard must live until exit so the file is flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (config, config_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _guard = init_tracing(&config);
    if let Some(e) = config_err {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(base_url = config.api_base_url(), "telstrasms starting");

    let mut app = App::new(&config)?;
    let result = app.run().await;

    if let Err(ref e) = result {
        eprintln!("Error: {}", e);
    }

    info!("telstrasms shutting down");
    result
}
