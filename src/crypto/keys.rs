//! Key material and wrapping secrets.
//!
//! - `MasterKey`: the live 256-bit AES-GCM key, zeroized on drop.
//! - `Passphrase`: the user's secret, wraps the durable `mk_pe` form.
//! - `SessionToken`: the host's ambient secret, wraps the cached form.
//!
//! Passphrase and session token both go through PBKDF2 at the envelope
//! boundary, but they are separate types so one can never be handed in
//! where the other is expected.

use std::fmt;

use rand::rngs::OsRng;
use rand::TryRngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{PmVaultError, Result};

/// Length of the master key in bytes (256 bits).
pub const MASTER_KEY_LEN: usize = 32;

/// The live master key.  Cannot be cloned, and its bytes are wiped
/// when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PmVaultError::ProviderFailure(format!("OS random source: {e}")))?;
        let key = Self { bytes };
        bytes.zeroize();
        Ok(key)
    }

    /// Import raw key bytes (as produced by `export`).
    ///
    /// Anything other than exactly 32 bytes is rejected.
    pub fn import(raw: &[u8]) -> Result<Self> {
        let bytes: [u8; MASTER_KEY_LEN] = raw.try_into().map_err(|_| {
            PmVaultError::ProviderFailure(format!(
                "master key must be {MASTER_KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Export a copy of the raw key bytes for wrapping.
    pub fn export(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.bytes.to_vec())
    }

    /// Access the raw key bytes (e.g. to build a cipher).
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// The user's passphrase.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Zeroizing<String>> for Passphrase {
    fn from(value: Zeroizing<String>) -> Self {
        Self(value)
    }
}

impl From<&str> for Passphrase {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// Host-supplied session secret, stable for one host session.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// A random 256-bit token, hex-encoded.  Used by hosts that have no
    /// ambient session secret of their own.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|e| PmVaultError::ProviderFailure(format!("OS random source: {e}")))?;
        Ok(Self(Zeroizing::new(hex::encode(&bytes[..]))))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The token text, for handing back to the host.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}
