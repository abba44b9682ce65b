//! CLI command implementations.

pub mod orders;
pub mod roles;

use thiserror::Error;

use hapus_storefront::config::{ConfigError, FirebaseConfig};
use hapus_storefront::db::RepositoryError;
use hapus_storefront::store::FirebaseStore;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Firebase settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store access failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Nothing stored at the given id.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Connect to the Firebase database configured in the environment.
///
/// # Errors
///
/// Returns `CommandError::Config` if the Firebase variables are missing or
/// the database secret fails validation.
pub fn connect() -> Result<FirebaseStore, CommandError> {
    dotenvy::dotenv().ok();

    let config = FirebaseConfig::from_env()?;
    tracing::info!(database = %config.database_url, "Connecting to Firebase database...");
    Ok(FirebaseStore::new(config.database_url, config.database_secret))
}
