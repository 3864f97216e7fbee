//! Passphrase-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The deployed format derives wrapping keys with a fixed all-zero
//! 32-byte salt and only 100 iterations.  Both are far below modern
//! guidance, but every existing `mk_pe` was produced that way and the
//! envelope wire format carries no version tag, so the defaults here
//! must stay as they are to keep those ciphertexts readable.
//!
//! `KdfParams` is the hardening seam: a deployment that introduces its
//! own format version can raise the iteration count or pin a different
//! salt without touching any caller.

use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::{PmVaultError, Result};

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Length of the fixed salt used by the deployed format.
pub const LEGACY_SALT_LEN: usize = 32;

/// Iteration count used by the deployed format.
pub const LEGACY_ITERATIONS: u32 = 100;

/// Where the PBKDF2 salt comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaltStrategy {
    /// 32 zero bytes, as used by every existing ciphertext.
    FixedZero,
    /// A deployment-wide salt pinned in configuration.
    Fixed(Vec<u8>),
}

impl SaltStrategy {
    fn salt(&self) -> &[u8] {
        const ZERO_SALT: [u8; LEGACY_SALT_LEN] = [0u8; LEGACY_SALT_LEN];
        match self {
            SaltStrategy::FixedZero => &ZERO_SALT,
            SaltStrategy::Fixed(bytes) => bytes,
        }
    }
}

/// Configurable PBKDF2 parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 iteration count (default: 100).
    pub iterations: u32,
    /// Salt policy (default: 32 zero bytes).
    pub salt: SaltStrategy,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: LEGACY_ITERATIONS,
            salt: SaltStrategy::FixedZero,
        }
    }
}

/// Derive a 32-byte AES-256-GCM key from a passphrase with the default
/// (wire-compatible) parameters.
pub fn derive_key(passphrase: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    derive_key_with_params(passphrase, &KdfParams::default())
}

/// Derive a 32-byte key with explicit PBKDF2 parameters.
///
/// The same passphrase + params always produce the same key.
pub fn derive_key_with_params(
    passphrase: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if params.iterations < 1 {
        return Err(PmVaultError::KeyDerivationFailed(
            "PBKDF2 iterations must be at least 1".into(),
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(
        passphrase,
        params.salt.salt(),
        params.iterations,
        &mut key[..],
    )
    .map_err(|e| PmVaultError::KeyDerivationFailed(format!("PBKDF2 failed: {e}")))?;

    Ok(key)
}
