//! Obfuscator errors.

use thiserror::Error;

/// Errors raised while obfuscating or revealing identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length does not select an AES variant
    #[error("Invalid key length {length}: expected 16, 24 or 32 bytes")]
    InvalidKeyLength {
        /// Length that was supplied
        length: usize,
    },

    /// The OS random source failed to produce a nonce
    #[error("Failed to generate nonce: {0}")]
    Randomness(String),

    /// AEAD seal failed
    #[error("Encryption failed")]
    Encryption,

    /// AEAD open failed (wrong key, tampered or truncated input)
    #[error("Decryption failed")]
    Decryption,

    /// Input is not a base-58 encoded `nonce || ciphertext+tag`
    #[error("Malformed encoded identifier: {reason}")]
    MalformedEncoding {
        /// What was wrong with the input
        reason: String,
    },
}
