//! Property-based tests for key minting, storage and error mapping.

mod common;

use std::time::Duration;

use axum::body::to_bytes;
use axum::response::IntoResponse;
use proptest::prelude::*;
use serde_json::{Value, json};

use secret_vault::crypto::{NONCE_LEN, Obfuscator, TAG_LEN, truncate_public_key};
use secret_vault::error::retry_after_secs;
use secret_vault::jwt::AuthError;
use secret_vault::store::{SecretStore, StoreError};
use secret_vault::{ErrorCategory, VaultError};

use common::{OBFUSCATION_KEY, key_minter, memory_store};

fn arb_payload() -> impl Strategy<Value = String> {
    ".{1,200}"
}

fn arb_aes_key() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![Just(16usize), Just(24), Just(32)]
        .prop_flat_map(|len| proptest::collection::vec(any::<u8>(), len))
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A stored payload comes back exactly once, byte for byte.
    #[test]
    fn prop_payload_retrieved_exactly_once(payload in arb_payload()) {
        let store = memory_store();
        let (first, second) = tokio_test::block_on(async {
            let key = store.put(&payload).await.unwrap();
            (store.take_once(&key).await, store.take_once(&key).await)
        });

        prop_assert_eq!(first.unwrap(), payload);
        prop_assert!(second.unwrap_err().is_missing());
    }

    /// Obfuscating the same identifier twice never yields the same string,
    /// and both reveal the identifier.
    #[test]
    fn prop_obfuscation_is_randomized(key in arb_aes_key(), identifier in "[ -~]{1,64}") {
        let obfuscator = Obfuscator::from_bytes(&key).unwrap();

        let a = obfuscator.obfuscate(&identifier).unwrap();
        let b = obfuscator.obfuscate(&identifier).unwrap();

        prop_assert_ne!(&a, &b);
        prop_assert_eq!(obfuscator.reveal(&a).unwrap(), identifier.clone());
        prop_assert_eq!(obfuscator.reveal(&b).unwrap(), identifier);
    }

    /// Encoded output only uses the base-58 alphabet and carries nonce and tag.
    #[test]
    fn prop_obfuscation_output_is_base58(identifier in "[ -~]{0,64}") {
        let obfuscator = Obfuscator::from_bytes(OBFUSCATION_KEY).unwrap();
        let encoded = obfuscator.obfuscate(&identifier).unwrap();

        prop_assert!(encoded.chars().all(|c| BASE58_ALPHABET.contains(c)));
        let decoded_len = bs58::decode(&encoded).into_vec().unwrap().len();
        prop_assert_eq!(decoded_len, NONCE_LEN + identifier.len() + TAG_LEN);
    }

    /// Truncation caps the length and keeps a prefix.
    #[test]
    fn prop_truncation_keeps_prefix(encoded in "[1-9A-HJ-NP-Za-km-z]{0,120}", max_len in 1usize..100) {
        let truncated = truncate_public_key(encoded.clone(), max_len);

        prop_assert_eq!(truncated.len(), encoded.len().min(max_len));
        prop_assert!(encoded.starts_with(&truncated));
    }

    /// Minted keys never exceed the configured length.
    #[test]
    fn prop_minted_keys_respect_max_len(max_len in 1usize..120) {
        let key = key_minter(max_len).mint().unwrap();
        prop_assert!(!key.is_empty());
        prop_assert!(key.len() <= max_len);
    }

    /// Retry-After is always a whole number of seconds, at least one, never
    /// shorter than the real wait.
    #[test]
    fn prop_retry_after_rounds_up(millis in 0u64..120_000) {
        let wait = Duration::from_millis(millis);
        let secs = retry_after_secs(wait);

        prop_assert!(secs >= 1);
        prop_assert!(Duration::from_secs(secs) >= wait);
        prop_assert!(Duration::from_secs(secs) < wait + Duration::from_secs(1) || millis == 0);
    }

    /// Client-facing bodies carry only the category message, whatever the cause.
    #[test]
    fn prop_error_body_hides_cause(reason in "cause-[a-z0-9]{8,24}") {
        let errors = [
            VaultError::invalid_request(reason.clone()),
            VaultError::internal(reason.clone()),
            VaultError::from(AuthError::malformed(reason.clone())),
        ];

        for err in errors {
            let category = err.category();
            let response = err.into_response();
            prop_assert_eq!(response.status(), category.status());

            let body = tokio_test::block_on(to_bytes(response.into_body(), usize::MAX)).unwrap();
            let text = String::from_utf8(body.to_vec()).unwrap();
            prop_assert!(!text.contains(&reason));

            let json: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(json, json!({ "error": category.message() }));
        }
    }
}

#[test]
fn test_store_errors_map_to_one_category_each() {
    let cases = [
        (StoreError::NotFound, ErrorCategory::NotFound),
        (StoreError::AlreadyConsumed, ErrorCategory::NotFound),
        (StoreError::EmptyPayload, ErrorCategory::Validation),
        (StoreError::KeyCollision, ErrorCategory::Database),
        (StoreError::Timeout(Duration::from_secs(1)), ErrorCategory::Database),
    ];

    for (err, expected) in cases {
        assert_eq!(VaultError::from(err).category(), expected);
    }
}
