//! Secret Vault - one-time secret sharing.
//!
//! A caller holding a valid identity provider token stores a secret and gets
//! back an opaque public key; the first authenticated retrieval of that key
//! returns the secret and tombstones it. Every later retrieval, like a lookup
//! of a key that never existed, reports "not found".

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod jwt;
pub mod observability;
pub mod rate_limiter;
pub mod service;
pub mod shutdown;
pub mod store;

use std::sync::Arc;

use tracing::{info, warn};

pub use config::Config;
pub use error::{ErrorCategory, VaultError, VaultResult};
pub use service::VaultService;

use crate::config::RECOMMENDED_KEY_ENTROPY_BITS;
use crate::crypto::{KeyMinter, Obfuscator};
use crate::jwt::Gatekeeper;
use crate::observability::VaultMetrics;
use crate::rate_limiter::TokenBucketLimiter;
use crate::store::PostgresSecretStore;

/// Wires the production collaborators described by `config`.
///
/// Connects to PostgreSQL and creates the schema if needed.
pub async fn build_service(config: &Config) -> VaultResult<VaultService> {
    let obfuscator = Obfuscator::new(&config.encryption_key)?;
    info!(algorithm = obfuscator.algorithm(), "Identifier obfuscator ready");

    if config.has_weak_key_length() {
        warn!(
            key_len = config.max_key_length,
            entropy_bits = config.public_key_entropy_bits(),
            recommended_bits = RECOMMENDED_KEY_ENTROPY_BITS,
            "KEY_LEN yields public keys below the recommended entropy"
        );
    }

    let minter = KeyMinter::new(obfuscator, config.max_key_length);
    let store = PostgresSecretStore::connect(&config.database, minter).await?;

    let limiter = TokenBucketLimiter::new(config.admission_rate()?);
    info!(rate = limiter.rate().get(), burst = limiter.burst().get(), "Admission limiter ready");

    let gatekeeper = Gatekeeper::new(config.gatekeeper_config()?)?;

    let metrics = VaultMetrics::new()
        .map_err(|e| VaultError::internal(format!("metrics registration failed: {e}")))?;

    Ok(VaultService::new(
        Arc::new(store),
        Arc::new(limiter),
        Arc::new(gatekeeper),
        Arc::new(metrics),
    ))
}
