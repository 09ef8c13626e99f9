//! Configuration, filesystem paths, errors, and logging bootstrap shared by
//! the LinkVault crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_CALLBACK_PORT, DEFAULT_LOG_LEVEL, DEFAULT_OAUTH_PROVIDER,
    DEFAULT_SUPABASE_PUBLISHABLE_KEY, DEFAULT_SUPABASE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
