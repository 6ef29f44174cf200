//! In-memory secret store for tests and local development.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::crypto::KeyMinter;
use crate::store::{SecretRecord, SecretStore, StoreError};

/// Secret store over a mutex-guarded map.
///
/// Clones share the same records.
#[derive(Debug, Clone)]
pub struct MemorySecretStore {
    records: Arc<Mutex<HashMap<String, SecretRecord>>>,
    minter: KeyMinter,
}

impl MemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(minter: KeyMinter) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            minter,
        }
    }

    /// Snapshot of the record stored under `key`.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<SecretRecord> {
        self.records.lock().get(key).cloned()
    }

    /// Number of records, consumed or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn put(&self, payload: &str) -> Result<String, StoreError> {
        if payload.is_empty() {
            return Err(StoreError::EmptyPayload);
        }

        let key = self.minter.mint()?;
        match self.records.lock().entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::KeyCollision),
            Entry::Vacant(slot) => {
                slot.insert(SecretRecord::new(key.clone(), payload));
                Ok(key)
            }
        }
    }

    async fn take_once(&self, key: &str) -> Result<String, StoreError> {
        let mut records = self.records.lock();
        let record = records.get_mut(key).ok_or(StoreError::NotFound)?;
        record.consume(Utc::now())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
