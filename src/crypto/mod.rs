//! Cryptographic primitives for pmvault.
//!
//! This module provides:
//! - The envelope format and AES-256-GCM sealing (`envelope`)
//! - Wire encodings for envelope segments (`encoding`)
//! - PBKDF2 passphrase key derivation (`kdf`)
//! - Master key, passphrase and session token types (`keys`)

pub mod encoding;
pub mod envelope;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{seal, open, Envelope, MasterKey, ...};
pub use encoding::SegmentEncoding;
pub use envelope::{open, seal, Envelope, EnvelopeCipher, WrapKey};
pub use kdf::{derive_key, derive_key_with_params, KdfParams, SaltStrategy};
pub use keys::{MasterKey, Passphrase, SessionToken};
