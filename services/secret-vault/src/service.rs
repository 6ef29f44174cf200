//! Vault Service
//!
//! Composition root for the two operations. Every request runs the same
//! pipeline: admission, authentication, validation, then the store. The
//! first failing stage decides the error category.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{VaultError, VaultResult};
use crate::jwt::{AuthContext, TokenVerifier};
use crate::observability::VaultMetrics;
use crate::rate_limiter::{AdmissionLimiter, RateLimitDecision};
use crate::store::SecretStore;

/// Body of `POST /secret`.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSecretRequest {
    /// Payload to keep until its first retrieval
    #[serde(default)]
    pub secret: String,
}

/// Reply to `POST /secret`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSecretResponse {
    /// Public key for the one retrieval
    pub key: String,
}

/// Reply to `GET /secret/:key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveSecretResponse {
    /// The stored payload
    pub secret: String,
}

/// One-time secret service with injected collaborators.
#[derive(Clone)]
pub struct VaultService {
    store: Arc<dyn SecretStore>,
    limiter: Arc<dyn AdmissionLimiter>,
    verifier: Arc<dyn TokenVerifier>,
    metrics: Arc<VaultMetrics>,
}

impl VaultService {
    /// Creates a service over the given collaborators.
    pub fn new(
        store: Arc<dyn SecretStore>,
        limiter: Arc<dyn AdmissionLimiter>,
        verifier: Arc<dyn TokenVerifier>,
        metrics: Arc<VaultMetrics>,
    ) -> Self {
        Self {
            store,
            limiter,
            verifier,
            metrics,
        }
    }

    /// Metrics updated by this service.
    #[must_use]
    pub fn metrics(&self) -> &VaultMetrics {
        &self.metrics
    }

    /// Stores the secret carried by a JSON `body` and returns its public key.
    #[instrument(skip_all)]
    pub async fn store_secret(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> VaultResult<StoreSecretResponse> {
        let result = async {
            self.admit()?;
            self.authenticate(authorization).await?;

            let request = parse_store_request(body)?;
            let key = self.store.put(&request.secret).await?;

            self.metrics.record_stored();
            debug!(key_len = key.len(), "Secret stored");
            Ok(StoreSecretResponse { key })
        }
        .await;

        self.observe(result)
    }

    /// Hands out the secret stored under `key`, at most once.
    #[instrument(skip_all)]
    pub async fn retrieve_secret(
        &self,
        authorization: Option<&str>,
        key: &str,
    ) -> VaultResult<RetrieveSecretResponse> {
        let result = async {
            self.admit()?;
            self.authenticate(authorization).await?;

            if key.is_empty() {
                return Err(VaultError::invalid_request("empty key"));
            }
            let secret = self.store.take_once(key).await?;

            self.metrics.record_retrieved();
            debug!("Secret retrieved");
            Ok(RetrieveSecretResponse { secret })
        }
        .await;

        self.observe(result)
    }

    /// Checks that the store is reachable.
    pub async fn health(&self) -> VaultResult<()> {
        self.store.health_check().await.map_err(VaultError::from)
    }

    fn admit(&self) -> VaultResult<()> {
        match self.limiter.check() {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Denied { retry_after } => Err(VaultError::RateLimited { retry_after }),
        }
    }

    async fn authenticate(&self, authorization: Option<&str>) -> VaultResult<AuthContext> {
        Ok(self.verifier.authenticate(authorization).await?)
    }

    fn observe<T>(&self, result: VaultResult<T>) -> VaultResult<T> {
        if let Err(ref err) = result {
            self.metrics.record_rejected(err.category());
        }
        result
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// Parses and validates a store request body.
pub fn parse_store_request(body: &[u8]) -> VaultResult<StoreSecretRequest> {
    let request: StoreSecretRequest = serde_json::from_slice(body)
        .map_err(|e| VaultError::invalid_request(format!("body is not a secret request: {e}")))?;

    if request.secret.is_empty() {
        return Err(VaultError::invalid_request("secret is empty"));
    }
    Ok(request)
}
