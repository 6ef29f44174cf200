//! Public key minting.

use uuid::Uuid;

use crate::crypto::error::CryptoError;
use crate::crypto::obfuscator::Obfuscator;

/// Bits of entropy carried by one base-58 character.
const BITS_PER_BASE58_CHAR: f64 = 5.857_980_995_127_572; // log2(58)

/// Truncates an encoded key to at most `max_len` characters.
///
/// The encoding is ASCII, so truncating by byte length never splits a
/// character. Shorter keys are returned unchanged.
#[must_use]
pub fn truncate_public_key(mut encoded: String, max_len: usize) -> String {
    if encoded.len() > max_len {
        encoded.truncate(max_len);
    }
    encoded
}

/// Effective entropy of a base-58 key of `len` characters, in bits.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn key_entropy_bits(len: usize) -> f64 {
    len as f64 * BITS_PER_BASE58_CHAR
}

/// Mints public keys for new secret records.
///
/// The truncated ciphertext itself is the lookup key; it is never decrypted.
#[derive(Debug, Clone)]
pub struct KeyMinter {
    obfuscator: Obfuscator,
    max_len: usize,
}

impl KeyMinter {
    /// Creates a minter issuing keys of at most `max_len` characters.
    #[must_use]
    pub const fn new(obfuscator: Obfuscator, max_len: usize) -> Self {
        Self { obfuscator, max_len }
    }

    /// Mints a key for a fresh random identifier.
    pub fn mint(&self) -> Result<String, CryptoError> {
        let identifier = Uuid::new_v4().to_string();
        let encoded = self.obfuscator.obfuscate(&identifier)?;
        Ok(truncate_public_key(encoded, self.max_len))
    }
}
