//! Shared fixtures: an identity provider double served by wiremock, token
//! signing with fixture RSA keys, and in-memory service wiring.

#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use secret_vault::VaultService;
use secret_vault::crypto::{KeyMinter, Obfuscator};
use secret_vault::jwt::{Gatekeeper, GatekeeperConfig};
use secret_vault::observability::VaultMetrics;
use secret_vault::rate_limiter::TokenBucketLimiter;
use secret_vault::store::MemorySecretStore;

pub const IDP_SIGNING_KEY: &[u8] = include_bytes!("../fixtures/idp_signing_key.pem");
pub const ROGUE_SIGNING_KEY: &[u8] = include_bytes!("../fixtures/rogue_signing_key.pem");

/// Modulus of `IDP_SIGNING_KEY`, base64url.
pub const IDP_MODULUS: &str = "i409BTIfuZqFAtLNwPEWVPKMuALxgp57Uf_N4Ta8go1ZCcF4za_R8Bjdy-WHroSML9GWeBRmu-CIuf4HUNyep3wlUEOjv-zdBEEzDZ5mxqnjJisAoWeI-JzLTU1S4lCwGr9r4_-5YOBhc-eTY7SyIJa3eDeQFuujHQc389eN-d_fGQGPjxYlXDf3zhz-UO0aZC4VW2m9cwyMPfayUsLUxJSzRnuerQnLV3MSC1wYugjGkMEiknyO3XLUg_SZUPO7_r6UUGHE83G0nnGJ-nCFMyyfmIK9lIqjMcAz7WkFTqzMjxGQBnmFTQNHxWcx0nrKOYWmzAnj76PML-_c2ZHSZw";

/// Modulus of `ROGUE_SIGNING_KEY`, base64url.
pub const ROGUE_MODULUS: &str = "qHK5eEhxab94uw4iH-oSoNb5C31d7DeTII6oUG7EvitAe0XsJsyfa3nCKC3u5VsdB--F8D56iXQgxZaw27372MGpUKoAndsAfGBDq8kLbukhjzjXAvcOi0OskYAUqQrULKOt5jVM7mNx_9tI91PeqTIZ2xolZguQ4v0Kjk_zXLFVdIrQZYxeK5qnWeZY0dYFkeRcmnJ85SmqSJKSueDRP8vjRE4KtcxymD4paqa2yAeZnXeHA3Mi2TzlTs7AvL7EZeFmVLHEsjqFsRwHeVZI57VETm619dBl9SRnNaYZGvpZ410BrdK4gdla5cZQoi-MExd49T0lZQ5SgO0n69PSKw";

pub const IDP_KID: &str = "idp-key-1";
pub const AUDIENCE: &str = "https://vault.example.com";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const OBFUSCATION_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

/// JWK entry for an RSA signing key.
pub fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": modulus,
        "e": "AQAB",
    })
}

/// Key set publishing only the identity provider's key.
pub fn idp_jwks() -> Value {
    json!({ "keys": [rsa_jwk(IDP_KID, IDP_MODULUS)] })
}

/// Identity provider double.
pub struct IdentityProvider {
    pub server: MockServer,
}

impl IdentityProvider {
    /// Starts a provider publishing `jwks`.
    pub async fn start_with(jwks: Value) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&server)
            .await;
        Self { server }
    }

    /// Starts a provider publishing [`idp_jwks`].
    pub async fn start() -> Self {
        Self::start_with(idp_jwks()).await
    }

    pub fn jwks_url(&self) -> Url {
        Url::parse(&format!("{}{JWKS_PATH}", self.server.uri())).unwrap()
    }

    /// Issuer as the gatekeeper derives it: `https://<domain>/`.
    pub fn issuer(&self) -> String {
        "https://tenant.example.com/".to_string()
    }

    pub fn gatekeeper_config(&self) -> GatekeeperConfig {
        GatekeeperConfig::new(self.jwks_url(), self.issuer(), AUDIENCE)
            .with_fetch_timeout(Duration::from_secs(2))
    }

    pub fn gatekeeper(&self) -> Gatekeeper {
        Gatekeeper::new(self.gatekeeper_config()).unwrap()
    }

    /// Number of key set requests served so far.
    pub async fn jwks_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

/// Claims the gatekeeper accepts, valid for an hour.
pub fn valid_claims(issuer: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "iss": issuer,
        "sub": "client-123@clients",
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 3600,
    })
}

/// Signs `claims` with RS256 under `kid`.
pub fn sign_with(key_pem: &[u8], kid: Option<&str>, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, &EncodingKey::from_rsa_pem(key_pem).unwrap()).unwrap()
}

/// A token the identity provider double would issue.
pub fn idp_token(claims: &Value) -> String {
    sign_with(IDP_SIGNING_KEY, Some(IDP_KID), claims)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn key_minter(max_len: usize) -> KeyMinter {
    KeyMinter::new(Obfuscator::from_bytes(OBFUSCATION_KEY).unwrap(), max_len)
}

pub fn memory_store() -> MemorySecretStore {
    MemorySecretStore::new(key_minter(40))
}

/// Service over the in-memory store, a real gatekeeper and a limiter at `rate`.
pub fn memory_service(idp: &IdentityProvider, store: MemorySecretStore, rate: u32) -> VaultService {
    VaultService::new(
        Arc::new(store),
        Arc::new(TokenBucketLimiter::new(NonZeroU32::new(rate).unwrap())),
        Arc::new(idp.gatekeeper()),
        Arc::new(VaultMetrics::new().unwrap()),
    )
}
