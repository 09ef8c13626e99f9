//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default Supabase URL (can be overridden at compile time via SUPABASE_URL env var).
pub const DEFAULT_SUPABASE_URL: &str = match option_env!("SUPABASE_URL") {
    Some(url) => url,
    None => "https://linkvault.supabase.co",
};

/// Default Supabase publishable key (can be overridden at compile time via
/// SUPABASE_PUBLISHABLE_KEY env var).
pub const DEFAULT_SUPABASE_PUBLISHABLE_KEY: &str = match option_env!("SUPABASE_PUBLISHABLE_KEY")
{
    Some(key) => key,
    None => "public-anon-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Identity provider used for sign-in.
pub const DEFAULT_OAUTH_PROVIDER: &str = "google";

/// Port of the local OAuth redirect listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 54321;

const DEFAULT_BOOKMARKS_TABLE: &str = "bookmarks";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Supabase project URL.
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    /// Supabase publishable API key (public, safe to expose).
    #[serde(default = "default_supabase_publishable_key")]
    pub supabase_publishable_key: String,
    /// OAuth provider passed to the authorize endpoint.
    #[serde(default = "default_oauth_provider")]
    pub oauth_provider: String,
    /// Local port for the OAuth redirect callback.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// Table holding bookmark rows.
    #[serde(default = "default_bookmarks_table")]
    pub bookmarks_table: String,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_supabase_url() -> String {
    DEFAULT_SUPABASE_URL.to_string()
}

fn default_supabase_publishable_key() -> String {
    DEFAULT_SUPABASE_PUBLISHABLE_KEY.to_string()
}

fn default_oauth_provider() -> String {
    DEFAULT_OAUTH_PROVIDER.to_string()
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_bookmarks_table() -> String {
    DEFAULT_BOOKMARKS_TABLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            supabase_url: default_supabase_url(),
            supabase_publishable_key: default_supabase_publishable_key(),
            oauth_provider: default_oauth_provider(),
            callback_port: DEFAULT_CALLBACK_PORT,
            bookmarks_table: default_bookmarks_table(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if any), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = env_override("LINKVAULT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = env_override("LINKVAULT_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = env_override("LINKVAULT_SUPABASE_PUBLISHABLE_KEY") {
            self.supabase_publishable_key = key;
        }
        if let Some(provider) = env_override("LINKVAULT_OAUTH_PROVIDER") {
            self.oauth_provider = provider;
        }
        if let Some(port) = env_override("LINKVAULT_CALLBACK_PORT").and_then(|p| p.parse().ok()) {
            self.callback_port = port;
        }
    }

    /// Reject configurations the client cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.supabase_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "supabase_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.supabase_publishable_key.trim().is_empty() {
            return Err(CoreError::Config(
                "supabase_publishable_key is empty".to_string(),
            ));
        }
        if self.bookmarks_table.trim().is_empty() {
            return Err(CoreError::Config("bookmarks_table is empty".to_string()));
        }
        Ok(())
    }

    /// Get the Supabase URL as a parsed URL.
    pub fn supabase_url(&self) -> CoreResult<Url> {
        Url::parse(&self.supabase_url).map_err(CoreError::from)
    }

    /// Supabase base URL without a trailing slash, ready for path joins.
    pub fn api_base(&self) -> String {
        self.supabase_url.trim_end_matches('/').to_string()
    }

    /// Redirect target registered with the identity provider.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/auth/callback", self.callback_port)
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
