//! Stored secret records and the tombstone transition.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::store::StoreError;

/// A row of the `secrets` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SecretRecord {
    /// Public obfuscated identifier
    pub key: String,
    /// Payload; empty once retrieved
    #[sqlx(rename = "secret")]
    pub payload: Option<String>,
    /// When the record was consumed
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl SecretRecord {
    /// Creates an unread record.
    #[must_use]
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: Some(payload.into()),
            retrieved_at: None,
        }
    }

    /// Whether the record was already consumed.
    ///
    /// An empty payload counts as consumed even without a timestamp.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.retrieved_at.is_some() || self.payload.as_deref().is_none_or(str::is_empty)
    }

    /// Takes the payload and tombstones the record in place.
    pub fn consume(&mut self, now: DateTime<Utc>) -> Result<String, StoreError> {
        if self.is_consumed() {
            return Err(StoreError::AlreadyConsumed);
        }
        let payload = self.payload.replace(String::new()).unwrap_or_default();
        self.retrieved_at = Some(now);
        Ok(payload)
    }
}
