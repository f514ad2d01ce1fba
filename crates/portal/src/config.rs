//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SONNYS_ECOM_BASE` - eCommerce API base URL
//! - `SONNYS_ECOM_API_KEY` - eCommerce API key
//! - `SONNYS_ECOM_API_ID` - eCommerce API ID
//! - `SONNYS_BACKOFFICE_BASE` - BackOffice API base URL
//! - `SONNYS_BACKOFFICE_API_KEY` - BackOffice API key
//! - `SONNYS_BACKOFFICE_API_ID` - BackOffice API ID
//! - `SESSION_SECRET` - Cookie encryption secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PORTAL_HOST` - Bind address (default: 127.0.0.1)
//! - `PORTAL_PORT` - Listen port (default: 3000)
//! - `PORTAL_BASE_URL` - Public URL (default: <http://localhost:3000>); `https://` marks cookies `Secure`
//! - `SESSION_COOKIE_NAME` - Session cookie name (default: `sonnys_portal`)
//! - `SESSION_MAX_AGE` - Session lifetime in seconds (default: 28800, 8 hours)
//! - `BACKOFFICE_REVALIDATE_SECONDS` - BackOffice read cache TTL (default: 60, 0 disables)
//! - `PORTAL_DEFAULT_SITE_CODE` - Site preselected in the join flow (default: DEF)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default session lifetime: 8 hours.
pub const DEFAULT_SESSION_MAX_AGE: i64 = 8 * 60 * 60;

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "sonnys_portal";

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

/// Portal application configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the portal
    pub base_url: String,
    /// Session cookie settings
    pub session: SessionConfig,
    /// eCommerce API (registration, orders, payments)
    pub ecom: VendorApiConfig,
    /// BackOffice API (read-only account and billing lookups)
    pub backoffice: VendorApiConfig,
    /// How long BackOffice reads may be served from cache
    pub backoffice_revalidate: Duration,
    /// Site code preselected on the cart step
    pub default_site_code: String,
    /// Sentry error tracking settings
    pub sentry: SentryConfig,
}

/// Session cookie configuration.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct SessionConfig {
    /// Secret the cookie encryption key is derived from
    pub secret: SecretString,
    /// Cookie name
    pub cookie_name: String,
    /// Cookie `Max-Age` in seconds
    pub max_age_seconds: i64,
    /// Whether to mark the cookie `Secure` (production / HTTPS)
    pub secure: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"[REDACTED]")
            .field("cookie_name", &self.cookie_name)
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Credentials and base URL for one of the vendor APIs.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct VendorApiConfig {
    /// API base URL, e.g. `https://api.example.net/ecom/v1`
    pub base_url: Url,
    /// Value of the `X-Sonnys-API-Key` header
    pub api_key: SecretString,
    /// Value of the `X-Sonnys-API-ID` header
    pub api_id: String,
}

impl std::fmt::Debug for VendorApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("api_id", &self.api_id)
            .finish()
    }
}

/// Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// DSN; Sentry is disabled when absent
    pub dsn: Option<String>,
    /// Environment name reported with events
    pub environment: Option<String>,
    /// Error event sample rate (0.0 - 1.0)
    pub sample_rate: f32,
    /// Performance transaction sample rate (0.0 - 1.0)
    pub traces_sample_rate: f32,
}

impl PortalConfig {
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

        let host = parse_env_or_default::<IpAddr>("PORTAL_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("PORTAL_PORT", "3000")?;
        let base_url = get_env_or_default("PORTAL_BASE_URL", "http://localhost:3000");

        let session = SessionConfig::from_env(&base_url)?;
        let ecom = VendorApiConfig::from_env("SONNYS_ECOM")?;
        let backoffice = VendorApiConfig::from_env("SONNYS_BACKOFFICE")?;
        let backoffice_revalidate = Duration::from_secs(parse_env_or_default::<u64>(
            "BACKOFFICE_REVALIDATE_SECONDS",
            "60",
        )?);
        let default_site_code = get_env_or_default("PORTAL_DEFAULT_SITE_CODE", "DEF");
        let sentry = SentryConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            session,
            ecom,
            backoffice,
            backoffice_revalidate,
            default_site_code,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SessionConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        let secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&secret, "SESSION_SECRET")?;

        let max_age_seconds =
            parse_env_or_default::<i64>("SESSION_MAX_AGE", &DEFAULT_SESSION_MAX_AGE.to_string())?;
        if max_age_seconds <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_MAX_AGE".to_string(),
                "must be a positive number of seconds".to_string(),
            ));
        }

        Ok(Self {
            secret,
            cookie_name: get_env_or_default("SESSION_COOKIE_NAME", DEFAULT_SESSION_COOKIE_NAME),
            max_age_seconds,
            secure: base_url.starts_with("https://"),
        })
    }
}

impl VendorApiConfig {
    /// Load `{prefix}_BASE`, `{prefix}_API_KEY` and `{prefix}_API_ID`.
    fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let base_key = format!("{prefix}_BASE");
        let base_url = parse_base_url(&base_key, &get_required_env(&base_key)?)?;

        Ok(Self {
            base_url,
            api_key: get_validated_secret(&format!("{prefix}_API_KEY"))?,
            api_id: get_required_env(&format!("{prefix}_API_ID"))?,
        })
    }
}

impl SentryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
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
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a vendor base URL.
///
/// A trailing slash is enforced so that joining relative paths keeps the
/// base path (`https://host/v1/` + `shop/payment`).
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };

    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
    let len = s.chars().count() as f64;
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

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
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

    fn vendor(base: &str) -> VendorApiConfig {
        VendorApiConfig {
            base_url: parse_base_url("TEST_BASE", base).unwrap(),
            api_key: SecretString::from("k3y-Value-9xQ!"),
            api_id: "portal".to_string(),
        }
    }

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
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababababababab", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "SESSION_SECRET").is_err());
    }

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("TEST_BASE", "https://api.vendor.test/ecom/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.vendor.test/ecom/v1/");
        assert_eq!(
            url.join("shop/payment").unwrap().as_str(),
            "https://api.vendor.test/ecom/v1/shop/payment"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("TEST_BASE", "ftp://vendor.test").is_err());
        assert!(parse_base_url("TEST_BASE", "not a url").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = PortalConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session: SessionConfig {
                secret: SecretString::from("x".repeat(32)),
                cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
                max_age_seconds: DEFAULT_SESSION_MAX_AGE,
                secure: false,
            },
            ecom: vendor("http://127.0.0.1:9001"),
            backoffice: vendor("http://127.0.0.1:9002"),
            backoffice_revalidate: Duration::from_secs(60),
            default_site_code: "DEF".to_string(),
            sentry: SentryConfig::default(),
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_vendor_config_debug_redacts_key() {
        let config = VendorApiConfig {
            base_url: parse_base_url("TEST_BASE", "https://vendor.test").unwrap(),
            api_key: SecretString::from("super_private_api_key"),
            api_id: "portal-id".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("vendor.test"));
        assert!(debug_output.contains("portal-id"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private_api_key"));
    }

    #[test]
    fn test_session_config_debug_redacts_secret() {
        let config = SessionConfig {
            secret: SecretString::from("session-material-that-must-not-leak"),
            cookie_name: "sonnys_portal".to_string(),
            max_age_seconds: 60,
            secure: true,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("sonnys_portal"));
        assert!(!debug_output.contains("must-not-leak"));
    }
}
