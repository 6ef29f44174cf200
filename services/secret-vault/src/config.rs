//! Type-Safe Configuration with Validation
//!
//! Loads the service configuration from the environment (optionally seeded
//! from a `.env` file) and validates it once at startup.

use std::env;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;
use url::Url;

use crate::crypto::{ObfuscationKey, key_entropy_bits};
use crate::jwt::GatekeeperConfig;

/// Largest `statement_timeout` PostgreSQL accepts (a 32-bit millisecond count).
const MAX_STATEMENT_TIMEOUT_MS: u128 = 2_147_483_647;

/// Public keys carrying fewer bits than this are flagged at startup.
pub const RECOMMENDED_KEY_ENTROPY_BITS: f64 = 128.0;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Obfuscation key has a length no AES-GCM variant accepts
    #[error("Invalid ENC_KEY: expected 16, 24 or 32 bytes, got {0}")]
    InvalidEncryptionKey(usize),

    /// A value that must be strictly positive was zero
    #[error("Invalid {0}: must be greater than 0")]
    NotPositive(&'static str),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// PostgreSQL TLS mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbSslMode {
    /// Plain TCP
    Disable,
    /// TLS when the server offers it
    Prefer,
    /// TLS or fail
    Require,
}

impl FromStr for DbSslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(format!("unknown ssl mode '{other}'")),
        }
    }
}

impl From<DbSslMode> for PgSslMode {
    fn from(mode: DbSslMode) -> Self {
        match mode {
            DbSslMode::Disable => Self::Disable,
            DbSslMode::Prefer => Self::Prefer,
            DbSslMode::Require => Self::Require,
        }
    }
}

/// Database connection parameters.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login role
    pub user: String,
    /// Password, omitted for trust/peer authentication
    pub password: Option<String>,
    /// Database name
    pub name: String,
    /// TLS mode
    pub ssl_mode: DbSslMode,
    /// Pool size
    pub max_connections: u32,
    /// Bound on pool acquisition and on every store operation, in seconds
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    /// Builds sqlx connect options, including the server-side statement timeout.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(self.ssl_mode.into())
            .options([("statement_timeout", format!("{}ms", self.statement_timeout_ms()))]);

        if let Some(ref password) = self.password {
            opts = opts.password(password);
        }
        opts
    }

    /// Store operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `statement_timeout` in milliseconds, clamped to what PostgreSQL accepts.
    fn statement_timeout_ms(&self) -> u128 {
        self.timeout().as_millis().min(MAX_STATEMENT_TIMEOUT_MS)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Certificate and private key for encrypted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Secret store connection
    pub database: DatabaseConfig,
    /// Key for the identifier obfuscator
    pub encryption_key: ObfuscationKey,
    /// Maximum length of an issued public key
    pub max_key_length: usize,
    /// Admitted requests per second, shared by all endpoints
    pub rate_limit: u32,
    /// Identity provider domain
    pub auth_domain: String,
    /// Expected token audience
    pub auth_audience: String,
    /// Key set cache lifetime in seconds; 0 fetches on every request
    pub jwks_cache_ttl_seconds: u64,
    /// Key set fetch timeout in seconds
    pub jwks_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Encrypted transport, `None` when disabled
    pub tls: Option<TlsConfig>,
    /// Fallback log filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let https_enabled = env::var("HTTPS_ENABLED").map_or(true, |v| v != "false");
        let tls = https_enabled.then(|| TlsConfig {
            cert_path: env::var("TLS_CERT_PATH")
                .unwrap_or_else(|_| "cert.pem".to_string())
                .into(),
            key_path: env::var("TLS_KEY_PATH")
                .unwrap_or_else(|_| "key.pem".to_string())
                .into(),
        });

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 3000)?,
            database: DatabaseConfig {
                host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: parse_env("DB_PORT", 5432)?,
                user: env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string()),
                password: env::var("DB_PASSWORD").ok().filter(|p| !p.is_empty()),
                name: env::var("DB_NAME").unwrap_or_else(|_| "postgres".to_string()),
                ssl_mode: parse_env("DB_SSL_MODE", DbSslMode::Disable)?,
                max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
                timeout_secs: parse_env("DB_TIMEOUT", 5)?,
            },
            encryption_key: ObfuscationKey::new(require_env("ENC_KEY")?.into_bytes()),
            max_key_length: parse_required_env("KEY_LEN")?,
            rate_limit: parse_env("RATE_LIMIT", 10)?,
            auth_domain: require_env("URL")?,
            auth_audience: require_env("AUDIENCE")?,
            jwks_cache_ttl_seconds: parse_env("JWKS_CACHE_TTL", 300)?,
            jwks_timeout_secs: parse_env("JWKS_TIMEOUT", 5)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", 30)?,
            shutdown_timeout_seconds: parse_env("SHUTDOWN_TIMEOUT", 30)?,
            tls,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_env("LOG_JSON", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 || self.database.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if !matches!(self.encryption_key.len(), 16 | 24 | 32) {
            return Err(ConfigError::InvalidEncryptionKey(self.encryption_key.len()));
        }
        if self.max_key_length == 0 {
            return Err(ConfigError::NotPositive("KEY_LEN"));
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::NotPositive("RATE_LIMIT"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::NotPositive("DB_MAX_CONNECTIONS"));
        }
        if self.database.timeout_secs == 0 {
            return Err(ConfigError::NotPositive("DB_TIMEOUT"));
        }
        if self.jwks_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("JWKS_TIMEOUT"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("REQUEST_TIMEOUT"));
        }
        if self.auth_domain.trim().is_empty() {
            return Err(ConfigError::MissingRequired("URL".to_string()));
        }
        if self.auth_audience.trim().is_empty() {
            return Err(ConfigError::MissingRequired("AUDIENCE".to_string()));
        }
        self.jwks_url()?;
        Ok(())
    }

    /// Gets the identity provider key set URL.
    pub fn jwks_url(&self) -> Result<Url, ConfigError> {
        let raw = format!("https://{}/.well-known/jwks.json", self.auth_domain);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
            field: "URL".to_string(),
            reason: e.to_string(),
        })
    }

    /// Gets the issuer every accepted token must carry.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.auth_domain)
    }

    /// Creates the gatekeeper configuration from this config.
    pub fn gatekeeper_config(&self) -> Result<GatekeeperConfig, ConfigError> {
        Ok(GatekeeperConfig::new(self.jwks_url()?, self.issuer(), &self.auth_audience)
            .with_cache_ttl(Duration::from_secs(self.jwks_cache_ttl_seconds))
            .with_fetch_timeout(Duration::from_secs(self.jwks_timeout_secs)))
    }

    /// Admission rate as a non-zero value.
    pub fn admission_rate(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.rate_limit).ok_or(ConfigError::NotPositive("RATE_LIMIT"))
    }

    /// Effective entropy of an issued public key, in bits.
    #[must_use]
    pub fn public_key_entropy_bits(&self) -> f64 {
        key_entropy_bits(self.max_key_length)
    }

    /// Whether `KEY_LEN` falls short of [`RECOMMENDED_KEY_ENTROPY_BITS`].
    #[must_use]
    pub fn has_weak_key_length(&self) -> bool {
        self.public_key_entropy_bits() < RECOMMENDED_KEY_ENTROPY_BITS
    }

    /// Listen address.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read a required environment variable.
fn require_env(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ConfigError::MissingRequired(name.to_string())),
    }
}

/// Parse a required environment variable.
fn parse_required_env<T: FromStr>(name: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    let val = require_env(name)?;
    val.parse().map_err(|e: T::Err| ConfigError::ParseError {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an environment variable with a default value.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
