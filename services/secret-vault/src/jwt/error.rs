//! Authentication errors.

use thiserror::Error;

/// Reasons a bearer token is rejected.
///
/// Every variant surfaces to clients as the same `auth` category; the detail
/// is for server-side logs only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header, or an empty one
    #[error("Bearer token missing")]
    TokenMissing,

    /// Token could not be parsed
    #[error("Token malformed: {reason}")]
    TokenMalformed {
        /// Parser detail
        reason: String,
    },

    /// Token is signed with an algorithm other than the expected one
    #[error("Unexpected signing algorithm: {found}")]
    UnexpectedAlgorithm {
        /// Algorithm named in the token header
        found: String,
    },

    /// No key in the identity provider's key set matches the token's key id
    #[error("Unknown signing key: {kid}")]
    UnknownKeyId {
        /// Key id from the token header
        kid: String,
    },

    /// Signature did not verify
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// `exp` is in the past
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// Expiry as a Unix timestamp
        expired_at: i64,
    },

    /// `nbf` is in the future
    #[error("Token not valid before {valid_from}")]
    TokenNotYetValid {
        /// Not-before as a Unix timestamp
        valid_from: i64,
    },

    /// `aud` does not contain the expected audience
    #[error("Token audience mismatch")]
    AudienceMismatch,

    /// `iss` differs from the expected issuer
    #[error("Token issuer mismatch: {found}")]
    IssuerMismatch {
        /// Issuer carried by the token
        found: String,
    },

    /// The key set could not be fetched or parsed
    #[error("Key set unavailable: {reason}")]
    KeySetUnavailable {
        /// Fetch or parse detail
        reason: String,
    },
}

impl AuthError {
    /// Shorthand for [`AuthError::TokenMalformed`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::TokenMalformed {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`AuthError::KeySetUnavailable`].
    pub fn key_set(reason: impl Into<String>) -> Self {
        Self::KeySetUnavailable {
            reason: reason.into(),
        }
    }
}
