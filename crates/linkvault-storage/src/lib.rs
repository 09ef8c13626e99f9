//! Session persistence for the LinkVault client.
//!
//! Secrets live in a single owner-only JSON file under the base directory
//! (`~/.linkvault/session.json`). Tests use [`MemoryStorage`].

mod file;
mod keys;
mod memory;
mod secrets;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use secrets::{SecretsManager, SessionMeta};
pub use traits::SecureStorage;

use linkvault_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not be opened
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Key not found
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default storage implementation for `paths`.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn SecureStorage>> {
    let storage = FileStorage::new(paths.session_file())?;
    tracing::debug!(path = %storage.path().display(), "using file storage");
    Ok(Box::new(storage))
}

/// Convenience: a [`SecretsManager`] over the default storage.
pub fn create_secrets_manager(paths: &Paths) -> StorageResult<SecretsManager> {
    Ok(SecretsManager::new(create_storage(paths)?))
}
