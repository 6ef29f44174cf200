//! Identifier obfuscation.
//!
//! Turns internal record identifiers into unguessable public keys:
//! AES-GCM under a fresh random nonce, `nonce || ciphertext+tag`, base-58.

pub mod error;
pub mod minter;
pub mod obfuscator;

pub use error::CryptoError;
pub use minter::{KeyMinter, key_entropy_bits, truncate_public_key};
pub use obfuscator::{NONCE_LEN, ObfuscationKey, Obfuscator, TAG_LEN};
