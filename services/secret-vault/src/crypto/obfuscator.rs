//! AES-GCM identifier obfuscator.
//!
//! Output is `base58(nonce || ciphertext || tag)`. A fresh nonce is drawn for
//! every call, so obfuscating the same identifier twice yields different
//! strings.

use std::fmt;

use aes_gcm::{
    Aes128Gcm, Aes256Gcm, AesGcm, Nonce,
    aead::{Aead, KeyInit, consts::U12},
    aes::Aes192,
};
use rand::{CryptoRng, RngCore, rngs::OsRng};

use crate::crypto::error::CryptoError;

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Raw obfuscation key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ObfuscationKey(Vec<u8>);

impl ObfuscationKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ObfuscationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObfuscationKey(<{} bytes redacted>)", self.0.len())
    }
}

/// AES-GCM variant selected by key length.
#[derive(Clone)]
enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn from_key(key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |_| CryptoError::InvalidKeyLength { length: key.len() };
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192Gcm::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            length => Err(CryptoError::InvalidKeyLength { length }),
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Aes128(_) => "AES-128-GCM",
            Self::Aes192(_) => "AES-192-GCM",
            Self::Aes256(_) => "AES-256-GCM",
        }
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.encrypt(nonce, plaintext),
            Self::Aes192(c) => c.encrypt(nonce, plaintext),
            Self::Aes256(c) => c.encrypt(nonce, plaintext),
        }
        .map_err(|_| CryptoError::Encryption)
    }

    fn open(&self, nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt(nonce, sealed),
            Self::Aes192(c) => c.decrypt(nonce, sealed),
            Self::Aes256(c) => c.decrypt(nonce, sealed),
        }
        .map_err(|_| CryptoError::Decryption)
    }
}

/// Turns identifiers into opaque, URL-safe public keys.
#[derive(Clone)]
pub struct Obfuscator {
    cipher: Cipher,
}

impl Obfuscator {
    /// Creates an obfuscator, rejecting keys no AES variant accepts.
    pub fn new(key: &ObfuscationKey) -> Result<Self, CryptoError> {
        Self::from_bytes(key.as_bytes())
    }

    /// Creates an obfuscator from raw key bytes.
    pub fn from_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: Cipher::from_key(key)?,
        })
    }

    /// Cipher in use, e.g. `AES-256-GCM`.
    #[must_use]
    pub const fn algorithm(&self) -> &'static str {
        self.cipher.name()
    }

    /// Obfuscates `identifier` under a nonce drawn from the OS random source.
    pub fn obfuscate(&self, identifier: &str) -> Result<String, CryptoError> {
        self.obfuscate_with_rng(identifier, &mut OsRng)
    }

    /// Obfuscates `identifier` under a nonce drawn from `rng`.
    pub fn obfuscate_with_rng<R>(&self, identifier: &str, rng: &mut R) -> Result<String, CryptoError>
    where
        R: RngCore + CryptoRng,
    {
        let mut nonce = [0u8; NONCE_LEN];
        rng.try_fill_bytes(&mut nonce)
            .map_err(|e| CryptoError::Randomness(e.to_string()))?;

        let sealed = self.cipher.seal(&nonce, identifier.as_bytes())?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&sealed);

        Ok(bs58::encode(combined).into_string())
    }

    /// Recovers the identifier from a complete (untruncated) encoded string.
    pub fn reveal(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::MalformedEncoding {
                reason: e.to_string(),
            })?;

        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::MalformedEncoding {
                reason: format!("{} bytes is shorter than nonce and tag", combined.len()),
            });
        }

        let (nonce, sealed) = combined.split_at(NONCE_LEN);
        let plaintext = self.cipher.open(nonce, sealed)?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::MalformedEncoding {
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for Obfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obfuscator")
            .field("algorithm", &self.cipher.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"example key 1234";

    /// Random source that always fails.
    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("random reader error")))
        }
    }

    impl CryptoRng for FailingRng {}

    #[test]
    fn test_obfuscate_then_reveal() {
        let obfuscator = Obfuscator::from_bytes(KEY).unwrap();
        let encoded = obfuscator.obfuscate("test-identifier").unwrap();

        assert!(!encoded.is_empty());
        assert_eq!(obfuscator.reveal(&encoded).unwrap(), "test-identifier");
    }

    #[test]
    fn test_layout_is_nonce_then_sealed() {
        let obfuscator = Obfuscator::from_bytes(KEY).unwrap();
        let encoded = obfuscator.obfuscate("abc").unwrap();
        let raw = bs58::decode(&encoded).into_vec().unwrap();

        assert_eq!(raw.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn test_supported_key_lengths() {
        for (len, name) in [(16, "AES-128-GCM"), (24, "AES-192-GCM"), (32, "AES-256-GCM")] {
            let obfuscator = Obfuscator::from_bytes(&vec![7u8; len]).unwrap();
            assert_eq!(obfuscator.algorithm(), name);
        }
    }

    #[test]
    fn test_invalid_key_length() {
        let result = Obfuscator::from_bytes(b"short key");
        assert_eq!(result.unwrap_err(), CryptoError::InvalidKeyLength { length: 9 });
    }

    #[test]
    fn test_randomness_failure_surfaces() {
        let obfuscator = Obfuscator::from_bytes(KEY).unwrap();
        let err = obfuscator
            .obfuscate_with_rng("test-identifier", &mut FailingRng)
            .unwrap_err();

        assert!(matches!(err, CryptoError::Randomness(_)));
        assert!(err.to_string().contains("Failed to generate nonce"));
    }

    #[test]
    fn test_reveal_with_wrong_key_fails() {
        let encoded = Obfuscator::from_bytes(KEY).unwrap().obfuscate("id").unwrap();
        let other = Obfuscator::from_bytes(b"another key 5678").unwrap();

        assert_eq!(other.reveal(&encoded).unwrap_err(), CryptoError::Decryption);
    }

    #[test]
    fn test_reveal_rejects_non_base58() {
        let obfuscator = Obfuscator::from_bytes(KEY).unwrap();
        // '0', 'O', 'I' and 'l' are outside the Bitcoin alphabet.
        assert!(matches!(
            obfuscator.reveal("0OIl"),
            Err(CryptoError::MalformedEncoding { .. })
        ));
    }

    #[test]
    fn test_reveal_rejects_short_input() {
        let obfuscator = Obfuscator::from_bytes(KEY).unwrap();
        let short = bs58::encode([1u8; NONCE_LEN]).into_string();
        assert!(matches!(
            obfuscator.reveal(&short),
            Err(CryptoError::MalformedEncoding { .. })
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let key = ObfuscationKey::new(KEY.to_vec());
        assert!(!format!("{key:?}").contains("example"));
        let obfuscator = Obfuscator::new(&key).unwrap();
        assert!(format!("{obfuscator:?}").contains("AES-128-GCM"));
    }
}
