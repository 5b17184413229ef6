//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WARUNG_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `WARUNG_BASE_URL` - Public URL of the storefront UI (payment redirect target)
//! - `MIDTRANS_SERVER_KEY` - Payment gateway server key
//! - `RAJAONGKIR_API_KEY` - Shipping rate API key
//! - `RAJAONGKIR_ORIGIN_CITY_ID` - Warehouse city used as shipping origin
//! - `IDENTITY_WEBHOOK_SECRET` - Shared bearer secret for identity provider webhooks
//!
//! ## Optional
//! - `WARUNG_HOST` - Bind address (default: 127.0.0.1)
//! - `WARUNG_PORT` - Listen port (default: 3000)
//! - `MIDTRANS_IS_PRODUCTION` - Use the production gateway (default: false)
//! - `RAJAONGKIR_BASE_URL` - Shipping API base URL
//! - `SHIPPING_ITEM_WEIGHT_GRAMS` - Weight charged per item (default: 1000)
//! - `IDENTITY_SUBJECT_HEADER` - Header carrying the verified subject (default: x-identity-subject)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default shipping API endpoint (starter tier).
pub const DEFAULT_RAJAONGKIR_BASE_URL: &str = "https://api.rajaongkir.com/starter";

/// Default header carrying the identity provider subject.
pub const DEFAULT_SUBJECT_HEADER: &str = "x-identity-subject";

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
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the storefront UI
    pub base_url: String,
    /// Payment gateway configuration
    pub midtrans: MidtransConfig,
    /// Shipping rate API configuration
    pub shipping: ShippingConfig,
    /// Identity provider integration
    pub identity: IdentityConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Payment gateway (Midtrans Snap) configuration.
///
/// Implements `Debug` manually to redact the server key.
#[derive(Clone)]
pub struct MidtransConfig {
    pub server_key: SecretString,
    pub is_production: bool,
}

impl std::fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"[REDACTED]")
            .field("is_production", &self.is_production)
            .finish()
    }
}

/// Shipping rate (RajaOngkir) configuration.
#[derive(Clone)]
pub struct ShippingConfig {
    pub api_key: SecretString,
    pub base_url: String,
    /// City the warehouse ships from.
    pub origin_city_id: String,
    /// Weight charged per unit of any product.
    pub item_weight_grams: u32,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("origin_city_id", &self.origin_city_id)
            .field("item_weight_grams", &self.item_weight_grams)
            .finish()
    }
}

/// Identity provider integration.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Bearer secret expected on identity webhooks.
    pub webhook_secret: SecretString,
    /// Header the upstream proxy uses to forward the verified subject.
    pub subject_header: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("webhook_secret", &"[REDACTED]")
            .field("subject_header", &self.subject_header)
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

        let database_url = get_database_url("WARUNG_DATABASE_URL")?;
        let host = get_env_or_default("WARUNG_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("WARUNG_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("WARUNG_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("WARUNG_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("WARUNG_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("WARUNG_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            midtrans: MidtransConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
            identity: IdentityConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MidtransConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_key: get_validated_secret("MIDTRANS_SERVER_KEY")?,
            is_production: parse_bool("MIDTRANS_IS_PRODUCTION", false)?,
        })
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let item_weight_grams = get_env_or_default("SHIPPING_ITEM_WEIGHT_GRAMS", "1000")
            .parse::<u32>()
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "SHIPPING_ITEM_WEIGHT_GRAMS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Self {
            api_key: get_validated_secret("RAJAONGKIR_API_KEY")?,
            base_url: get_env_or_default("RAJAONGKIR_BASE_URL", DEFAULT_RAJAONGKIR_BASE_URL),
            origin_city_id: get_required_env("RAJAONGKIR_ORIGIN_CITY_ID")?,
            item_weight_grams,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            webhook_secret: get_validated_secret("IDENTITY_WEBHOOK_SECRET")?,
            subject_header: get_env_or_default("IDENTITY_SUBJECT_HEADER", DEFAULT_SUBJECT_HEADER)
                .to_ascii_lowercase(),
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

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a boolean flag (`true`/`false`/`1`/`0`).
fn parse_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected true or false, got '{other}'"),
            )),
        },
    }
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

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
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

    fn sample_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/warung"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:5173".to_string(),
            midtrans: MidtransConfig {
                server_key: SecretString::from("SB-Mid-server-k3y-9fQz"),
                is_production: false,
            },
            shipping: ShippingConfig {
                api_key: SecretString::from("ro-key-7Hq2pL"),
                base_url: DEFAULT_RAJAONGKIR_BASE_URL.to_string(),
                origin_city_id: "501".to_string(),
                item_weight_grams: 1000,
            },
            identity: IdentityConfig {
                webhook_secret: SecretString::from("whsec-Zp8wQ1"),
                subject_header: DEFAULT_SUBJECT_HEADER.to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-server-key", "MIDTRANS_SERVER_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("Mid-Zq8x!c2VbN4m@Lk7Jh", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = sample_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());

        assert!(debug_output.contains("501"));
        assert!(debug_output.contains("x-identity-subject"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("SB-Mid-server-k3y-9fQz"));
        assert!(!debug_output.contains("ro-key-7Hq2pL"));
        assert!(!debug_output.contains("whsec-Zp8wQ1"));
    }
}
