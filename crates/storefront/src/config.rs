//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (fallback: `DATABASE_URL`)
//! - `PAYMENT_WEBHOOK_SECRET` - HMAC key for payment signatures (min 32 chars, high entropy)
//! - `STOREFRONT_ADMIN_API_TOKEN` - Bearer token for admin routes (min 32 chars, high entropy)
//! - `CARRIER_EMAIL` - Carrier API account email
//! - `CARRIER_PASSWORD` - Carrier API account password
//! - `CARRIER_PICKUP_LOCATION` - Carrier-side name of the pickup warehouse
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CARRIER_BASE_URL` - Carrier API root (default: `https://apiv2.shiprocket.in/`)
//! - `CARRIER_API_TOKEN` - Long-lived carrier token, tried before logging in
//! - `CARRIER_TIMEOUT_SECS` - Per-call carrier timeout (default: 30)
//! - `STORE_TIMEOUT_SECS` - Order write / rule read timeout (default: 10)
//! - `NOTIFY_TIMEOUT_SECS` - Notification send timeout (default: 10)
//! - `PRICING_FAIL_OPEN` - Price at zero charges when rules are unreadable (default: true)
//! - `VERIFICATION_CODE_TTL_SECS` - Code lifetime (default: 300)
//! - `VERIFICATION_FRESHNESS_SECS` - Completed verification window (default: 3600)
//! - `KLAVIYO_API_KEY` - Notification channel; notifications are only logged when unset
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `STOREFRONT_LOG_FORMAT` - `json` for JSON logs (default: pretty)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::carrier::{CarrierCredentials, GatewaySettings, PackageDefaults};
use crate::services::VerificationSettings;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CARRIER_BASE_URL: &str = "https://apiv2.shiprocket.in/";

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

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
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
    /// HMAC key shared with the payment gateway
    pub payment_secret: SecretString,
    /// Bearer token accepted on admin routes
    pub admin_api_token: SecretString,
    pub carrier: CarrierConfig,
    pub pipeline: PipelineConfig,
    /// Klaviyo API key; `None` logs notifications instead of sending them
    pub klaviyo_api_key: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub log_format: LogFormat,
}

/// Shipping carrier configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct CarrierConfig {
    pub base_url: Url,
    pub email: String,
    pub password: SecretString,
    /// Long-lived token used until the carrier rejects it
    pub api_token: Option<SecretString>,
    pub pickup_location: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for CarrierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierConfig")
            .field("base_url", &self.base_url.as_str())
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("pickup_location", &self.pickup_location)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CarrierConfig {
    /// Settings for the fulfillment gateway.
    #[must_use]
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            credentials: CarrierCredentials {
                email: self.email.clone(),
                password: self.password.clone(),
            },
            static_token: self.api_token.clone(),
            pickup_location: self.pickup_location.clone(),
            package: PackageDefaults::default(),
            call_timeout: self.timeout,
        }
    }
}

/// Timeouts and policies for the order pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub store_timeout: Duration,
    pub notify_timeout: Duration,
    pub pricing_fail_open: bool,
    pub code_ttl: Duration,
    pub verification_freshness: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
            pricing_fail_open: true,
            code_ttl: Duration::from_secs(300),
            verification_freshness: Duration::from_secs(3600),
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub const fn verification(&self) -> VerificationSettings {
        VerificationSettings {
            code_ttl: self.code_ttl,
            freshness: self.verification_freshness,
        }
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

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "3000")?;

        let payment_secret = get_validated_secret("PAYMENT_WEBHOOK_SECRET")?;
        validate_min_length(&payment_secret, "PAYMENT_WEBHOOK_SECRET")?;
        let admin_api_token = get_validated_secret("STOREFRONT_ADMIN_API_TOKEN")?;
        validate_min_length(&admin_api_token, "STOREFRONT_ADMIN_API_TOKEN")?;

        let carrier = CarrierConfig::from_env()?;
        let pipeline = PipelineConfig::from_env()?;

        let log_format = match get_optional_env("STOREFRONT_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            database_url,
            host,
            port,
            payment_secret,
            admin_api_token,
            carrier,
            pipeline,
            klaviyo_api_key: get_optional_env("KLAVIYO_API_KEY").map(SecretString::from),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_format,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CarrierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_parsed_or_default::<Url>("CARRIER_BASE_URL", DEFAULT_CARRIER_BASE_URL)?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "CARRIER_BASE_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            email: get_required_env("CARRIER_EMAIL")?,
            password: get_required_secret("CARRIER_PASSWORD")?,
            api_token: get_optional_env("CARRIER_API_TOKEN").map(SecretString::from),
            pickup_location: get_required_env("CARRIER_PICKUP_LOCATION")?,
            timeout: get_secs_or_default("CARRIER_TIMEOUT_SECS", 30)?,
        })
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let pricing_fail_open = match get_optional_env("PRICING_FAIL_OPEN") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "PRICING_FAIL_OPEN".to_string(),
                    format!("expected true or false, got {value:?}"),
                )
            })?,
            None => defaults.pricing_fail_open,
        };

        Ok(Self {
            store_timeout: get_secs_or_default("STORE_TIMEOUT_SECS", 10)?,
            notify_timeout: get_secs_or_default("NOTIFY_TIMEOUT_SECS", 10)?,
            pricing_fail_open,
            code_ttl: get_secs_or_default("VERIFICATION_CODE_TTL_SECS", 300)?,
            verification_freshness: get_secs_or_default("VERIFICATION_FRESHNESS_SECS", 3600)?,
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

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// A positive number of seconds.
fn get_secs_or_default(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs = get_parsed_or_default::<u64>(key, &default.to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Validate that a secret meets minimum length requirements.
fn validate_min_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
