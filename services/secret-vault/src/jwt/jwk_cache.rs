//! JWK Cache with Single-Flight Refresh
//!
//! Holds the identity provider's signing keys for a bounded time:
//! - keys are reused for the configured TTL; a TTL of zero fetches the key
//!   set for every lookup
//! - a lookup for an unknown key id triggers one refresh before failing
//! - concurrent refreshes collapse into a single HTTP request

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use jsonwebtoken::DecodingKey;
use rust_common::{HttpConfig, build_http_client};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::jwt::error::AuthError;

/// Shortest base64url RSA modulus accepted (2048 bits).
const MIN_RSA_MODULUS_B64_LEN: usize = 342;

/// JSON Web Key structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, oct)
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default)]
    pub e: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

/// One fetched key set.
struct LocalCacheEntry {
    keys: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
}

type InflightFuture = Shared<BoxFuture<'static, Result<Arc<LocalCacheEntry>, AuthError>>>;

/// Signing key cache for one identity provider.
pub struct JwkCache {
    /// Last fetched key set
    local_cache: Arc<ArcSwapOption<LocalCacheEntry>>,
    /// JWKS endpoint URL
    jwks_url: Url,
    /// Key set lifetime; zero disables reuse
    ttl: Duration,
    /// Single-flight coordinator
    inflight: Arc<Mutex<Option<InflightFuture>>>,
    /// HTTP client for fetching JWKS
    http_client: reqwest::Client,
}

impl JwkCache {
    /// Creates a cache for `jwks_url`, bounding every fetch by `fetch_timeout`.
    pub fn new(jwks_url: Url, ttl: Duration, fetch_timeout: Duration) -> Result<Self, AuthError> {
        let http_client = build_http_client(&HttpConfig::default().with_timeout(fetch_timeout))
            .map_err(|e| AuthError::key_set(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(jwks_url, ttl, http_client))
    }

    /// Creates a cache that fetches through `http_client`.
    #[must_use]
    pub fn with_client(jwks_url: Url, ttl: Duration, http_client: reqwest::Client) -> Self {
        Self {
            local_cache: Arc::new(ArcSwapOption::empty()),
            jwks_url,
            ttl,
            inflight: Arc::new(Mutex::new(None)),
            http_client,
        }
    }

    /// Gets the decoding key for `kid`.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.try_get_local(kid) {
            return Ok(key);
        }

        let entry = self.refresh_single_flight(kid).await?;
        entry.keys.get(kid).cloned().ok_or_else(|| {
            debug!(available = entry.keys.len(), "Key id not in key set");
            AuthError::UnknownKeyId {
                kid: kid.to_string(),
            }
        })
    }

    /// Tries to get a key from local cache if valid.
    fn try_get_local(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.fresh_entry().and_then(|entry| entry.keys.get(kid).cloned())
    }

    /// The cached key set, unless it has outlived the TTL.
    fn fresh_entry(&self) -> Option<Arc<LocalCacheEntry>> {
        self.local_cache
            .load_full()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
    }

    /// Refreshes the cache using the single-flight pattern.
    ///
    /// Callers arriving while a fetch is in flight await that fetch instead
    /// of issuing their own.
    async fn refresh_single_flight(&self, kid: &str) -> Result<Arc<LocalCacheEntry>, AuthError> {
        let mut inflight_guard = self.inflight.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(entry) = self.fresh_entry().filter(|entry| entry.keys.contains_key(kid)) {
            return Ok(entry);
        }

        // A finished future left behind by a cancelled leader is not reused.
        if let Some(fut) = inflight_guard.as_ref().filter(|fut| fut.peek().is_none()) {
            let fut = fut.clone();
            drop(inflight_guard);
            return fut.await;
        }

        let url = self.jwks_url.clone();
        let client = self.http_client.clone();
        let local_cache = Arc::clone(&self.local_cache);

        let fut: BoxFuture<'static, Result<Arc<LocalCacheEntry>, AuthError>> = Box::pin(async move {
            let entry = Arc::new(Self::fetch(&client, &url).await?);
            local_cache.store(Some(Arc::clone(&entry)));
            Ok(entry)
        });

        let shared_fut = fut.shared();
        *inflight_guard = Some(shared_fut.clone());
        drop(inflight_guard);

        let result = shared_fut.clone().await;
        self.finish_flight(&shared_fut).await;

        result
    }

    /// Clears the in-flight slot if it still holds `flight`.
    ///
    /// A newer flight installed after `flight` completed stays in place.
    async fn finish_flight(&self, flight: &InflightFuture) {
        let mut slot = self.inflight.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(flight)) {
            slot.take();
        }
    }

    async fn fetch(client: &reqwest::Client, url: &Url) -> Result<LocalCacheEntry, AuthError> {
        info!(url = %url, "Fetching JWKS");

        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AuthError::key_set(format!("Failed to fetch JWKS: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::key_set(format!(
                "JWKS fetch failed with status: {}",
                response.status()
            )));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AuthError::key_set(format!("Failed to parse JWKS: {e}")))?;

        let keys: HashMap<_, _> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                let kid = jwk.kid.clone()?;
                let key = Self::jwk_to_decoding_key(jwk)?;
                Some((kid, Arc::new(key)))
            })
            .collect();

        info!("JWKS cache updated with {} keys", keys.len());
        Ok(LocalCacheEntry {
            keys,
            fetched_at: Instant::now(),
        })
    }

    /// Converts a JWK to a `DecodingKey`. Only RSA signing keys are usable.
    fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
        if jwk.kty != "RSA" {
            debug!(kty = %jwk.kty, "Skipping non-RSA key");
            return None;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            return None;
        }

        let n = jwk.n.as_ref()?;
        let e = jwk.e.as_ref()?;

        if n.trim_end_matches('=').len() < MIN_RSA_MODULUS_B64_LEN {
            warn!(kid = ?jwk.kid, "RSA key too small, rejecting");
            return None;
        }

        DecodingKey::from_rsa_components(n, e).ok()
    }

    /// Number of locally cached keys.
    fn local_key_count(&self) -> usize {
        self.local_cache
            .load()
            .as_ref()
            .map_or(0, |entry| entry.keys.len())
    }
}

impl std::fmt::Debug for JwkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkCache")
            .field("jwks_url", &self.jwks_url.as_str())
            .field("ttl", &self.ttl)
            .field("keys", &self.local_key_count())
            .finish_non_exhaustive()
    }
}
