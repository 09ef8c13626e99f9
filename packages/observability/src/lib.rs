//! Structured logging for the LinkVault workspace.
//!
//! The `linkvault` binary calls [`init_with_config`] once; library crates
//! only emit `tracing` events. Events go to a JSONL file with credentials
//! redacted, and optionally to a compact stderr stream.

mod file;
mod json_layer;

use std::path::PathBuf;

pub use json_layer::{redact_value, LogEntry, REDACTED};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written as `service` on every line.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_level: String,
    /// JSONL destination. `None` disables the file sink.
    pub log_path: Option<PathBuf>,
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "linkvault".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Install the global subscriber.
///
/// Never fails the caller: an unwritable log file only disables the file
/// sink, and a second call is ignored.
pub fn init_with_config(config: LogConfig) {
    file::install(&config);
}
