//! The master key manager.
//!
//! Owns the single live master key and moves it through these states:
//!
//! ```text
//!                 fresh_start
//!  Uninitialized ─────────────────────────────────────────► Unlocked
//!        │                                                     ▲
//!        │ session_start      cache hit (resume)               │
//!        └──────────► Locked ──────────────────────────────────┤
//!                        │ cache miss                          │
//!                        ▼                                     │
//!                    Unlocking ── unlock_with_passphrase ──────┘
//!                     ▲     │ wrong passphrase
//!                     └─────┘ (prompt re-invoked with a retry hint)
//! ```
//!
//! The key is protected twice: `mk_pe` (wrapped under the passphrase) is
//! the durable copy the host persists, and a second copy wrapped under the
//! session token sits in the local `SessionCache` so a new session with
//! the same token can unlock without asking for the passphrase.
//!
//! Transitions take `&mut self`, so at most one unlock can be in flight
//! per manager.  `encrypt_secret` / `decrypt_secret` take `&self` and may
//! run in parallel once unlocked.

use std::fmt;

use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use super::cache::{SessionCache, MASTER_KEY_CACHE_TAG};
use crate::crypto::{Envelope, EnvelopeCipher, MasterKey, Passphrase, SessionToken};
use crate::errors::{PmVaultError, Result};

/// Hint passed to the prompt after a wrong passphrase.
pub const RETRY_HINT: &str = "Passphrase did not work. Please try again";

/// Host callback used when the manager needs the user's passphrase.
///
/// The host shows the hint (if any), collects a passphrase, and feeds it
/// back through `MasterKeyManager::unlock_with_passphrase`.
pub trait PassphrasePrompt: Send + Sync {
    fn request_passphrase(&self, retry_hint: Option<&str>);
}

impl<F> PassphrasePrompt for F
where
    F: Fn(Option<&str>) + Send + Sync,
{
    fn request_passphrase(&self, retry_hint: Option<&str>) {
        self(retry_hint)
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No `mk_pe`, no key.
    Uninitialized,
    /// `mk_pe` and session token known, no live key.
    Locked,
    /// Waiting for the host to supply a passphrase.
    Unlocking,
    /// Live key in memory.
    Unlocked,
}

/// Result of a transition that may need the user's passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockStatus {
    Unlocked,
    AwaitingPassphrase,
}

enum State {
    Uninitialized,
    Locked {
        mk_pe: Envelope,
        token: SessionToken,
    },
    Unlocking {
        mk_pe: Envelope,
        token: SessionToken,
        prompt: Box<dyn PassphrasePrompt>,
    },
    Unlocked {
        key: MasterKey,
        mk_pe: Envelope,
        token: SessionToken,
    },
}

impl State {
    fn kind(&self) -> KeyState {
        match self {
            State::Uninitialized => KeyState::Uninitialized,
            State::Locked { .. } => KeyState::Locked,
            State::Unlocking { .. } => KeyState::Unlocking,
            State::Unlocked { .. } => KeyState::Unlocked,
        }
    }
}

/// Holds the live master key and drives its lifecycle.
pub struct MasterKeyManager<C: SessionCache> {
    cache: C,
    cipher: EnvelopeCipher,
    state: State,
}

impl<C: SessionCache> MasterKeyManager<C> {
    /// Create a manager using the wire-compatible cipher.
    pub fn new(cache: C) -> Self {
        Self::with_cipher(cache, EnvelopeCipher::default())
    }

    /// Create a manager with explicit KDF / encoding settings.
    pub fn with_cipher(cache: C, cipher: EnvelopeCipher) -> Self {
        Self {
            cache,
            cipher,
            state: State::Uninitialized,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Create a brand-new master key protected by `passphrase`.
    ///
    /// Returns `mk_pe` for the host to persist.  The session cache is
    /// populated under `token`; a cache write failure is logged and
    /// otherwise ignored.
    pub fn fresh_start(&mut self, passphrase: &Passphrase, token: SessionToken) -> Result<Envelope> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(PmVaultError::InvalidState(
                "fresh start requires an uninitialized manager (log out first)".into(),
            ));
        }

        let key = MasterKey::generate()?;
        let raw = key.export();
        let mk_pe = self.cipher.seal(&raw, passphrase)?;
        self.refresh_cache(&raw, &token);

        info!("new master key generated");
        self.state = State::Unlocked {
            key,
            mk_pe: mk_pe.clone(),
            token,
        };
        Ok(mk_pe)
    }

    /// Start a session for an existing `mk_pe`.
    ///
    /// Tries the session cache first.  On any cache failure the manager
    /// moves to `Unlocking`, calls `prompt.request_passphrase(None)` and
    /// returns `AwaitingPassphrase`.
    pub fn session_start<P>(
        &mut self,
        mk_pe: Envelope,
        token: SessionToken,
        prompt: P,
    ) -> Result<UnlockStatus>
    where
        P: PassphrasePrompt + 'static,
    {
        if matches!(self.state, State::Unlocked { .. }) {
            return Err(PmVaultError::InvalidState(
                "a session is already unlocked (lock or log out first)".into(),
            ));
        }

        self.state = State::Locked { mk_pe, token };
        self.resume(prompt)
    }

    /// Leave `Locked` using the `mk_pe` and token kept by `lock`.
    ///
    /// Same recovery path as `session_start`: the session cache first,
    /// then `Unlocking` with `prompt.request_passphrase(None)`.
    pub fn resume<P>(&mut self, prompt: P) -> Result<UnlockStatus>
    where
        P: PassphrasePrompt + 'static,
    {
        let (mk_pe, token) = match std::mem::replace(&mut self.state, State::Uninitialized) {
            State::Locked { mk_pe, token } => (mk_pe, token),
            other => {
                let kind = other.kind();
                self.state = other;
                return Err(PmVaultError::InvalidState(format!(
                    "resume needs the Locked state, manager is {kind:?}"
                )));
            }
        };

        match self.recover_from_cache(&token) {
            Ok(key) => {
                info!("master key recovered from session cache");
                self.state = State::Unlocked { key, mk_pe, token };
                Ok(UnlockStatus::Unlocked)
            }
            Err(reason) => {
                debug!(%reason, "session cache miss, falling back to passphrase");
                self.state = State::Unlocking {
                    mk_pe,
                    token,
                    prompt: Box::new(prompt),
                };
                self.request_passphrase(None);
                Ok(UnlockStatus::AwaitingPassphrase)
            }
        }
    }

    /// Try `passphrase` against `mk_pe`.
    ///
    /// On success the key goes live and the session cache is refreshed
    /// for the current token.  A wrong passphrase keeps the manager in
    /// `Unlocking` and re-invokes the prompt with `RETRY_HINT`; there is
    /// no attempt limit here.
    pub fn unlock_with_passphrase(&mut self, passphrase: &Passphrase) -> Result<UnlockStatus> {
        let opened = match &self.state {
            State::Unlocking { mk_pe, .. } => self.cipher.open(mk_pe, passphrase),
            other => {
                return Err(PmVaultError::InvalidState(format!(
                    "passphrase unlock needs the Unlocking state, manager is {:?}",
                    other.kind()
                )))
            }
        };

        let raw = match opened {
            Ok(raw) => raw,
            Err(PmVaultError::AuthenticationFailure) => {
                warn!("passphrase unlock failed");
                self.request_passphrase(Some(RETRY_HINT));
                return Ok(UnlockStatus::AwaitingPassphrase);
            }
            Err(e) => return Err(e),
        };

        let key = MasterKey::import(&raw)?;
        match std::mem::replace(&mut self.state, State::Uninitialized) {
            State::Unlocking { mk_pe, token, .. } => {
                self.refresh_cache(&raw, &token);
                info!("master key unlocked with passphrase");
                self.state = State::Unlocked { key, mk_pe, token };
                Ok(UnlockStatus::Unlocked)
            }
            other => {
                self.state = other;
                Err(PmVaultError::InvalidState(
                    "manager left the Unlocking state during unlock".into(),
                ))
            }
        }
    }

    /// Re-wrap the live key under a new passphrase.
    ///
    /// Returns the new `mk_pe` for the host to persist.  The session cache
    /// is left alone since the key itself did not change.
    pub fn change_passphrase(&mut self, new_passphrase: &Passphrase) -> Result<Envelope> {
        let State::Unlocked { key, mk_pe, .. } = &mut self.state else {
            return Err(PmVaultError::KeyNotAvailable);
        };

        let new_mk_pe = self.cipher.seal(&key.export(), new_passphrase)?;
        *mk_pe = new_mk_pe.clone();

        info!("master key re-wrapped under a new passphrase");
        Ok(new_mk_pe)
    }

    /// Drop the live key but remember `mk_pe` and the token, so `resume`
    /// can bring it back.
    pub fn lock(&mut self) {
        self.state = match std::mem::replace(&mut self.state, State::Uninitialized) {
            State::Unlocked { mk_pe, token, .. } | State::Unlocking { mk_pe, token, .. } => {
                debug!("master key locked");
                State::Locked { mk_pe, token }
            }
            other => other,
        };
    }

    /// Drop the live key and clear the session cache.
    pub fn logout(&mut self) {
        if let Err(e) = self.cache.clear(MASTER_KEY_CACHE_TAG) {
            warn!(error = %e, "could not clear session cache");
        }
        self.state = State::Uninitialized;
        info!("logged out");
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Encrypt an account field under the live key.
    pub fn encrypt_secret(&self, plaintext: &[u8]) -> Result<Envelope> {
        self.cipher.seal(plaintext, self.live_key()?)
    }

    /// Decrypt an account field under the live key.
    pub fn decrypt_secret(&self, ciphertext: &Envelope) -> Result<Zeroizing<Vec<u8>>> {
        self.cipher.open(ciphertext, self.live_key()?)
    }

    /// `encrypt_secret` for text fields.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<Envelope> {
        self.encrypt_secret(plaintext.as_bytes())
    }

    /// `decrypt_secret` for text fields.
    pub fn decrypt_string(&self, ciphertext: &Envelope) -> Result<Zeroizing<String>> {
        let mut bytes = self.decrypt_secret(ciphertext)?;
        String::from_utf8(std::mem::take(&mut *bytes))
            .map(Zeroizing::new)
            .map_err(|e| {
                let mut bad_bytes = e.into_bytes();
                bad_bytes.zeroize();
                PmVaultError::SerializationError("secret value is not valid UTF-8".to_string())
            })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> KeyState {
        self.state.kind()
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, State::Unlocked { .. })
    }

    /// The current durable (passphrase-wrapped) form, if known.
    pub fn mk_pe(&self) -> Option<&Envelope> {
        match &self.state {
            State::Uninitialized => None,
            State::Locked { mk_pe, .. }
            | State::Unlocking { mk_pe, .. }
            | State::Unlocked { mk_pe, .. } => Some(mk_pe),
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cipher(&self) -> &EnvelopeCipher {
        &self.cipher
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn live_key(&self) -> Result<&MasterKey> {
        match &self.state {
            State::Unlocked { key, .. } => Ok(key),
            _ => Err(PmVaultError::KeyNotAvailable),
        }
    }

    fn recover_from_cache(&self, token: &SessionToken) -> Result<MasterKey> {
        let wire = self
            .cache
            .load(MASTER_KEY_CACHE_TAG)?
            .ok_or_else(|| PmVaultError::StorageUnavailable("no cached master key".into()))?;
        let raw = self.cipher.open_str(&wire, token)?;
        MasterKey::import(&raw)
    }

    /// Wrap `raw` under the session token and write it to the cache.
    /// Failures only cost a passphrase prompt next session.
    fn refresh_cache(&self, raw: &[u8], token: &SessionToken) {
        let stored = self
            .cipher
            .seal(raw, token)
            .and_then(|sealed| self.cache.store(MASTER_KEY_CACHE_TAG, &sealed.to_string()));

        match stored {
            Ok(()) => debug!("session cache refreshed"),
            Err(e) => warn!(error = %e, "could not write session cache"),
        }
    }

    fn request_passphrase(&self, retry_hint: Option<&str>) {
        if let State::Unlocking { prompt, .. } = &self.state {
            prompt.request_passphrase(retry_hint);
        }
    }
}

impl<C: SessionCache> fmt::Debug for MasterKeyManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeyManager")
            .field("state", &self.state.kind())
            .finish_non_exhaustive()
    }
}
