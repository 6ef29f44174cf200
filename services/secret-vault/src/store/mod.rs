//! Secret store: persistent records with an atomic read-once transaction.
//!
//! A record is created unread (`retrieved_at = None`) and is mutated exactly
//! once, by the first successful [`SecretStore::take_once`], which clears the
//! payload and stamps `retrieved_at` together. A record with `retrieved_at`
//! set never carries a non-empty payload.

pub mod memory;
pub mod model;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::CryptoError;

pub use memory::MemorySecretStore;
pub use model::SecretRecord;
pub use postgres::PostgresSecretStore;

/// Secret store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists for the key
    #[error("Secret not found")]
    NotFound,

    /// The record was already retrieved
    #[error("Secret already retrieved")]
    AlreadyConsumed,

    /// Refused to store an empty payload
    #[error("Secret payload is empty")]
    EmptyPayload,

    /// A freshly minted key already exists
    #[error("Public key collision")]
    KeyCollision,

    /// The operation did not finish in time
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Minting the public key failed
    #[error("Failed to generate key: {0}")]
    KeyGeneration(#[from] CryptoError),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the error means "no payload for this key", whatever the reason.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound | Self::AlreadyConsumed)
    }
}

/// Persistent secret storage with at-most-once retrieval.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Stores `payload` under a freshly minted public key and returns the key.
    async fn put(&self, payload: &str) -> Result<String, StoreError>;

    /// Returns the payload for `key` and tombstones the record.
    ///
    /// Under concurrent calls for the same key exactly one caller receives
    /// the payload; all others get [`StoreError::AlreadyConsumed`].
    async fn take_once(&self, key: &str) -> Result<String, StoreError>;

    /// Checks that the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
