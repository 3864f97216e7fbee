//! AES-256-GCM envelopes.
//!
//! Every encrypted value in pmvault (the passphrase-wrapped master key,
//! the session-cached master key, and each account field) is an
//! `Envelope`, written on the wire as two segments joined by `&`:
//!
//! ```text
//! SEG(iv: 12 bytes) "&" SEG(ciphertext || 16-byte GCM tag)
//! ```
//!
//! There is no version tag and no algorithm identifier; the algorithm is
//! always AES-256-GCM with no associated data.  See `encoding` for what
//! `SEG` means.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::encoding::SegmentEncoding;
use super::kdf::{derive_key_with_params, KdfParams, KEY_LEN};
use super::keys::{MasterKey, Passphrase, SessionToken};
use crate::errors::{PmVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const IV_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Separator between the IV and body segments.
const DELIMITER: char = '&';

/// A parsed envelope ciphertext.
///
/// `Display` renders the wire string; `FromStr` / `parse` reads it back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Envelope {
    iv: [u8; IV_LEN],
    body: Vec<u8>,
    encoding: SegmentEncoding,
}

impl Envelope {
    /// Parse a wire string.
    ///
    /// The segment encoding is detected from the IV: a segment that
    /// base64-decodes to exactly 12 bytes is raw, anything else must be
    /// a decimal list.  The body is read with the same encoding.
    pub fn parse(wire: &str) -> Result<Self> {
        let (iv_seg, body_seg) = wire.split_once(DELIMITER).ok_or_else(|| {
            PmVaultError::MalformedCiphertext("missing '&' delimiter".into())
        })?;
        if body_seg.contains(DELIMITER) {
            return Err(PmVaultError::MalformedCiphertext(
                "more than one '&' delimiter".into(),
            ));
        }

        let encoding = match SegmentEncoding::Raw.decode(iv_seg) {
            Ok(raw) if raw.len() == IV_LEN => SegmentEncoding::Raw,
            _ => SegmentEncoding::DecimalList,
        };

        let iv: [u8; IV_LEN] = encoding
            .decode(iv_seg)?
            .try_into()
            .map_err(|v: Vec<u8>| {
                PmVaultError::MalformedCiphertext(format!(
                    "IV must be {IV_LEN} bytes, got {}",
                    v.len()
                ))
            })?;

        let body = encoding.decode(body_seg)?;
        if body.len() < TAG_LEN {
            return Err(PmVaultError::MalformedCiphertext(format!(
                "body must hold at least a {TAG_LEN}-byte tag, got {} bytes",
                body.len()
            )));
        }

        Ok(Self { iv, body, encoding })
    }

    /// The 12-byte IV.
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Mutable access to the IV (for tamper tests).
    pub fn iv_mut(&mut self) -> &mut [u8; IV_LEN] {
        &mut self.iv
    }

    /// Ciphertext followed by the GCM tag.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Mutable access to the ciphertext and tag (for tamper tests and
    /// re-framing tools).
    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.body
    }

    /// The encoding this envelope was parsed from or sealed with.
    pub fn encoding(&self) -> SegmentEncoding {
        self.encoding
    }

    /// Re-render the same bytes with a different segment encoding.
    pub fn with_encoding(mut self, encoding: SegmentEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}",
            self.encoding.encode(&self.iv),
            self.encoding.encode(&self.body)
        )
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("encoding", &self.encoding)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl FromStr for Envelope {
    type Err = PmVaultError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Envelope {
    type Error = PmVaultError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Envelope> for String {
    fn from(value: Envelope) -> Self {
        value.to_string()
    }
}

/// The secret an envelope is sealed under.
///
/// Resolved once at the cipher boundary: raw keys are used as-is,
/// passphrases and session tokens go through PBKDF2.
#[derive(Clone, Copy)]
pub enum WrapKey<'a> {
    Raw(&'a MasterKey),
    Passphrase(&'a [u8]),
}

impl<'a> From<&'a MasterKey> for WrapKey<'a> {
    fn from(key: &'a MasterKey) -> Self {
        WrapKey::Raw(key)
    }
}

impl<'a> From<&'a Passphrase> for WrapKey<'a> {
    fn from(passphrase: &'a Passphrase) -> Self {
        WrapKey::Passphrase(passphrase.as_bytes())
    }
}

impl<'a> From<&'a SessionToken> for WrapKey<'a> {
    fn from(token: &'a SessionToken) -> Self {
        WrapKey::Passphrase(token.as_bytes())
    }
}

/// Authenticated encryption of byte payloads into envelopes.
///
/// The default cipher reproduces the deployed format exactly
/// (PBKDF2 x100 with a zero salt, decimal-list segments).
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCipher {
    pub kdf: KdfParams,
    pub encoding: SegmentEncoding,
}

impl EnvelopeCipher {
    pub fn new(kdf: KdfParams, encoding: SegmentEncoding) -> Self {
        Self { kdf, encoding }
    }

    /// Encrypt `payload` under `key` with a fresh random IV.
    pub fn seal<'a>(&self, payload: &[u8], key: impl Into<WrapKey<'a>>) -> Result<Envelope> {
        let cipher = self.cipher_for(key.into())?;

        let mut iv = [0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| PmVaultError::ProviderFailure(format!("OS random source: {e}")))?;

        let body = cipher
            .encrypt(Nonce::from_slice(&iv), payload)
            .map_err(|e| PmVaultError::ProviderFailure(format!("encryption error: {e}")))?;

        Ok(Envelope {
            iv,
            body,
            encoding: self.encoding,
        })
    }

    /// Decrypt and verify an envelope.
    ///
    /// A wrong key, a wrong passphrase and a tampered body all fail the
    /// same way: `AuthenticationFailure`.
    pub fn open<'a>(
        &self,
        envelope: &Envelope,
        key: impl Into<WrapKey<'a>>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let cipher = self.cipher_for(key.into())?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&envelope.iv), envelope.body.as_slice())
            .map_err(|_| PmVaultError::AuthenticationFailure)?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Parse a wire string and open it in one step.
    pub fn open_str<'a>(
        &self,
        wire: &str,
        key: impl Into<WrapKey<'a>>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        self.open(&Envelope::parse(wire)?, key)
    }

    fn cipher_for(&self, key: WrapKey<'_>) -> Result<Aes256Gcm> {
        let key_bytes: Zeroizing<[u8; KEY_LEN]> = match key {
            WrapKey::Raw(master) => Zeroizing::new(*master.as_bytes()),
            WrapKey::Passphrase(secret) => derive_key_with_params(secret, &self.kdf)?,
        };

        Aes256Gcm::new_from_slice(&key_bytes[..])
            .map_err(|e| PmVaultError::ProviderFailure(format!("invalid key length: {e}")))
    }
}

/// Seal with the default (wire-compatible) cipher.
pub fn seal<'a>(payload: &[u8], key: impl Into<WrapKey<'a>>) -> Result<Envelope> {
    EnvelopeCipher::default().seal(payload, key)
}

/// Open with the default (wire-compatible) cipher.
pub fn open<'a>(envelope: &Envelope, key: impl Into<WrapKey<'a>>) -> Result<Zeroizing<Vec<u8>>> {
    EnvelopeCipher::default().open(envelope, key)
}
