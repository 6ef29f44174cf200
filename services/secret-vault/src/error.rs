//! Error handling module with a closed client-facing taxonomy
//!
//! Component errors roll up into [`VaultError`]. Every variant maps to exactly
//! one [`ErrorCategory`], and only the category's fixed message ever reaches a
//! client; the detailed cause is logged server-side.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::jwt::AuthError;
use crate::store::StoreError;

/// Client-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or rejected credentials
    Auth,
    /// Malformed or empty request
    Validation,
    /// Storage failure
    Database,
    /// Anything else that went wrong on our side
    Server,
    /// Admission limiter refused the request
    RateLimit,
    /// Unknown or already retrieved key
    NotFound,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Auth,
        Self::Validation,
        Self::Database,
        Self::Server,
        Self::RateLimit,
        Self::NotFound,
    ];

    /// Get the string representation of the category
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Database => "database",
            Self::Server => "server",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
        }
    }

    /// HTTP status for this category.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Database | Self::Server => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Generic message shown to clients.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Auth => "Authentication failed",
            Self::Validation => "Invalid request data",
            Self::Database => "Database operation failed",
            Self::Server => "Internal server error",
            Self::RateLimit => "Too many requests",
            Self::NotFound => "Resource not found",
        }
    }

    /// Whether the client caused the failure.
    #[must_use]
    pub fn is_client_error(self) -> bool {
        self.status().is_client_error()
    }
}

/// Non-exhaustive service error.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum VaultError {
    /// Admission limiter refused the request
    #[error("Rate limit exceeded")]
    RateLimited {
        /// When a token becomes available
        retry_after: Duration,
    },

    /// Credentials missing or rejected
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Request body or path failed validation
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong
        reason: String,
    },

    /// Secret store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Obfuscator failure outside the store
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request exceeded its deadline
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// Configured deadline
        duration: Duration,
    },

    /// Internal error (details never leave the process)
    #[error("Internal error: {reason}")]
    Internal {
        /// Description of the failure
        reason: String,
    },
}

impl VaultError {
    /// Shorthand for [`VaultError::InvalidRequest`].
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`VaultError::Internal`].
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// The single category this error is reported as.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Auth(_) => ErrorCategory::Auth,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::Store(err) => match err {
                StoreError::NotFound | StoreError::AlreadyConsumed => ErrorCategory::NotFound,
                StoreError::EmptyPayload => ErrorCategory::Validation,
                StoreError::KeyGeneration(_) => ErrorCategory::Server,
                StoreError::KeyCollision | StoreError::Timeout(_) | StoreError::Database(_) => {
                    ErrorCategory::Database
                }
            },
            Self::Crypto(_) | Self::Config(_) | Self::Timeout { .. } | Self::Internal { .. } => {
                ErrorCategory::Server
            }
        }
    }

    /// Retry hint for rate-limited requests.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Whole seconds for a `Retry-After` header, rounded up, at least one.
#[must_use]
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Uniform error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Category message
    pub error: &'static str,
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let category = self.category();

        if category.is_client_error() {
            warn!(category = category.as_str(), error = %self, "Request rejected");
        } else {
            error!(category = category.as_str(), error = %self, "Request failed");
        }

        let mut response = (
            category.status(),
            Json(ErrorBody {
                error: category.message(),
            }),
        )
            .into_response();

        if let Some(wait) = self.retry_after() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(wait)));
        }

        response
    }
}

/// Result alias for service operations.
pub type VaultResult<T> = Result<T, VaultError>;
