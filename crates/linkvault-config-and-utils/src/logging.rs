//! Logging initialization.
//!
//! Thin wrapper over the `observability` package: structured JSONL goes to
//! `~/.linkvault/logs/linkvault.jsonl`, with an optional compact stderr copy.

use crate::Paths;

/// Initialize logging for the CLI.
///
/// `RUST_LOG` takes precedence over `level`. `verbose` mirrors events to stderr.
///
/// ```ignore
/// init_logging(&paths, "info", false);
/// tracing::info!("started");
/// ```
pub fn init_logging(paths: &Paths, level: &str, verbose: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: "linkvault".into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr: verbose,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
