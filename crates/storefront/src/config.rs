//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `HAPUS_BASE_URL` - Public URL for the storefront (sign-in links return here)
//!
//! ## Required for the Firebase backend
//! - `FIREBASE_API_KEY` - Web API key for the Identity Toolkit
//! - `FIREBASE_DATABASE_URL` - Realtime Database URL
//! - `FIREBASE_DATABASE_SECRET` - Database secret (high entropy)
//!
//! ## Optional
//! - `HAPUS_HOST` - Bind address (default: 127.0.0.1)
//! - `HAPUS_PORT` - Listen port (default: 3000)
//! - `HAPUS_BACKEND` - `firebase` or `memory` (default: firebase)
//! - `ADMIN_EMAILS` - Comma-separated admin allow-list
//! - `HAPUS_GUARD_WAIT_MS` - How long a guarded request waits for the role (default: 5000)
//! - `HAPUS_IDENTITY_IDLE_SECS` - Idle expiry of identity contexts (default: 1800)
//! - `HAPUS_AUTH_RATE_LIMIT` - Rate limit auth endpoints per client IP (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use hapus_core::AdminAllowList;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Store and auth provider backend
    pub backend: Backend,
    /// Emails always treated as admin unless suspended
    pub admin_emails: AdminAllowList,
    /// How long a guarded request waits for a loading session
    pub guard_wait: Duration,
    /// Idle expiry of per-session identity contexts
    pub identity_idle: Duration,
    /// Whether auth endpoints are rate limited
    pub auth_rate_limit: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Where documents and accounts live.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Firebase Realtime Database and Identity Toolkit.
    Firebase(FirebaseConfig),
    /// In-process store and provider; data is lost on restart.
    Memory,
}

impl Backend {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Firebase(_) => "firebase",
            Self::Memory => "memory",
        }
    }
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Web API key (not secret, but not logged either)
    pub api_key: SecretString,
    /// Realtime Database URL, e.g. `https://hapus-default-rtdb.firebaseio.com`
    pub database_url: Url,
    /// Database secret used as the REST `auth` parameter
    pub database_secret: SecretString,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"[REDACTED]")
            .field("database_url", &self.database_url.as_str())
            .field("database_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("HAPUS_HOST", "127.0.0.1")?;
        let port = parse_env("HAPUS_PORT", "3000")?;
        let base_url = get_required_env("HAPUS_BASE_URL")?;
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("HAPUS_BASE_URL".to_string(), e.to_string()))?;

        let backend = match get_env_or_default("HAPUS_BACKEND", "firebase").as_str() {
            "firebase" => Backend::Firebase(FirebaseConfig::from_env()?),
            "memory" => Backend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "HAPUS_BACKEND".to_string(),
                    format!("expected 'firebase' or 'memory', got '{other}'"),
                ));
            }
        };

        let admin_emails = AdminAllowList::parse(&get_env_or_default("ADMIN_EMAILS", ""));
        let guard_wait = Duration::from_millis(parse_env("HAPUS_GUARD_WAIT_MS", "5000")?);
        let identity_idle = Duration::from_secs(parse_env("HAPUS_IDENTITY_IDLE_SECS", "1800")?);
        let auth_rate_limit = parse_env("HAPUS_AUTH_RATE_LIMIT", "true")?;

        Ok(Self {
            host,
            port,
            base_url,
            backend,
            admin_emails,
            guard_wait,
            identity_idle,
            auth_rate_limit,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for running entirely in memory on `127.0.0.1:0`.
    ///
    /// Used by tests and local demos; nothing is read from the environment.
    #[must_use]
    pub fn in_memory(admin_emails: &str) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            backend: Backend::Memory,
            admin_emails: AdminAllowList::parse(admin_emails),
            guard_wait: Duration::from_secs(5),
            identity_idle: Duration::from_secs(1800),
            auth_rate_limit: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl FirebaseConfig {
    /// Load the Firebase settings on their own, for tools that only need the
    /// database.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or the secret fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("FIREBASE_DATABASE_URL")?;
        let database_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("FIREBASE_DATABASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_key: SecretString::from(get_required_env("FIREBASE_API_KEY")?),
            database_url,
            database_secret: get_validated_secret("FIREBASE_DATABASE_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Database secrets are random base62 strings
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret from the Firebase console."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("q8ZrT2vLm4XcB7nW");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-database-secret", "FIREBASE_DATABASE_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababab", "FIREBASE_DATABASE_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("Xk29fLq8ZrT2vLm4XcB7nW1pH5", "FIREBASE_DATABASE_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_in_memory_config() {
        let config = StorefrontConfig::in_memory("Owner@DevgadHapus.in, ");
        assert!(matches!(config.backend, Backend::Memory));
        assert_eq!(config.admin_emails.len(), 1);
        assert_eq!(config.socket_addr().ip().to_string(), "127.0.0.1");
        assert_eq!(config.socket_addr().port(), 0);
    }

    #[test]
    fn test_firebase_config_debug_redacts_secrets() {
        let config = FirebaseConfig {
            api_key: SecretString::from("AIzaSyD-super-secret-key"),
            database_url: Url::parse("https://hapus-default-rtdb.firebaseio.com").unwrap(),
            database_secret: SecretString::from("Xk29fLq8ZrT2vLm4XcB7nW1pH5"),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("hapus-default-rtdb.firebaseio.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AIzaSyD"));
        assert!(!debug_output.contains("Xk29fLq8"));
    }
}
