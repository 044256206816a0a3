// Logging module for structured logging using the tracing crate

use std::error::Error;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Text,
    /// One JSON object per event, for log aggregation systems
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected text or json", other)),
        }
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// The filter is read from `RUST_LOG` and falls back to `info`. Output goes
/// to stderr so the CLI can stream image bytes to stdout.
///
/// # Errors
///
/// Returns an error if a global subscriber was already installed.
///
/// # Examples
///
/// ```
/// use jpeg_body_filter::logging::{init_subscriber, LogFormat};
///
/// init_subscriber(LogFormat::Text).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(format: LogFormat) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}
