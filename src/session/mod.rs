//! Session module — the master key lifecycle.
//!
//! This module provides:
//! - `MasterKeyManager`, its state machine and the prompt callback (`manager`)
//! - The local session cache trait and its backends (`cache`)

pub mod cache;
pub mod manager;

// Re-export the most commonly used items.
#[cfg(feature = "keyring-store")]
pub use cache::KeyringSessionCache;
pub use cache::{FileSessionCache, MemorySessionCache, SessionCache, MASTER_KEY_CACHE_TAG};
pub use manager::{KeyState, MasterKeyManager, PassphrasePrompt, UnlockStatus, RETRY_HINT};
