//! Auth Gatekeeper
//!
//! Turns an `Authorization` header value into an [`AuthContext`] or an
//! [`AuthError`]. Each request is checked in a fixed order: prefix, parse,
//! algorithm, signing key, signature, time claims, audience, issuer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use tracing::{debug, instrument};
use url::Url;

use crate::jwt::claims::Audience;
use crate::jwt::error::AuthError;
use crate::jwt::jwk_cache::JwkCache;
use crate::jwt::token::{ClaimRequirements, Token, Unvalidated, Validated};

const BEARER_PREFIX: &str = "bearer ";

/// Gatekeeper settings.
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
    /// Identity provider key set endpoint
    pub jwks_url: Url,
    /// Exact issuer tokens must carry
    pub issuer: String,
    /// Audience tokens must name
    pub audience: String,
    /// Only accepted signing algorithm
    pub algorithm: Algorithm,
    /// Key set reuse window; zero fetches per request
    pub cache_ttl: Duration,
    /// Key set fetch deadline
    pub fetch_timeout: Duration,
}

impl GatekeeperConfig {
    /// Creates a config expecting RS256 tokens, with a five minute key cache.
    #[must_use]
    pub fn new(jwks_url: Url, issuer: impl Into<String>, audience: &str) -> Self {
        Self {
            jwks_url,
            issuer: issuer.into(),
            audience: audience.to_string(),
            algorithm: Algorithm::RS256,
            cache_ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the key set reuse window.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the key set fetch deadline.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Identity established for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Token issuer
    pub issuer: String,
    /// Token audience
    pub audience: Option<Audience>,
    /// Key that signed the token
    pub key_id: Option<String>,
    /// Token subject
    pub subject: Option<String>,
}

impl From<&Token<Validated>> for AuthContext {
    fn from(token: &Token<Validated>) -> Self {
        Self {
            issuer: token.issuer().to_string(),
            audience: token.claims().aud.clone(),
            key_id: token.kid().map(str::to_string),
            subject: token.subject().map(str::to_string),
        }
    }
}

/// Checks bearer credentials.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Authenticates the raw `Authorization` header value, if any.
    async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError>;
}

/// Strips an optional, case-insensitive `Bearer ` prefix.
#[must_use]
pub fn strip_bearer(value: &str) -> &str {
    let value = value.trim_start();
    match value.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => value[BEARER_PREFIX.len()..].trim(),
        _ => value.trim_end(),
    }
}

/// Verifies identity provider tokens against its published key set.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    config: GatekeeperConfig,
    jwk_cache: Arc<JwkCache>,
}

impl Gatekeeper {
    /// Creates a gatekeeper with its own key cache.
    pub fn new(config: GatekeeperConfig) -> Result<Self, AuthError> {
        let jwk_cache = JwkCache::new(config.jwks_url.clone(), config.cache_ttl, config.fetch_timeout)?;
        Ok(Self::with_cache(config, Arc::new(jwk_cache)))
    }

    /// Creates a gatekeeper over an existing key cache.
    #[must_use]
    pub const fn with_cache(config: GatekeeperConfig, jwk_cache: Arc<JwkCache>) -> Self {
        Self { config, jwk_cache }
    }

    /// Validates a raw token (without prefix) through every state.
    pub async fn validate_token(&self, raw_token: &str) -> Result<Token<Validated>, AuthError> {
        let unvalidated = Token::<Unvalidated>::parse(raw_token)?.require_algorithm(self.config.algorithm)?;

        let signature_validated = unvalidated.validate_signature(&self.jwk_cache).await?;

        signature_validated.validate_claims(ClaimRequirements {
            audience: &self.config.audience,
            issuer: &self.config.issuer,
            now: chrono::Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl TokenVerifier for Gatekeeper {
    #[instrument(skip_all)]
    async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthContext, AuthError> {
        let raw = authorization.map(strip_bearer).unwrap_or_default();
        if raw.is_empty() {
            return Err(AuthError::TokenMissing);
        }

        let token = self.validate_token(raw).await?;
        let context = AuthContext::from(&token);
        debug!(kid = ?context.key_id, subject = ?context.subject, "Token accepted");
        Ok(context)
    }
}
