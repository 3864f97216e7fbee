//! OS keyring backend for the session cache.
//!
//! Stores the token-wrapped master key in the operating system's
//! credential store:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring / KDE Wallet)
//!
//! Every failure maps to `StorageUnavailable`, which the manager treats
//! as a cache miss.

use crate::errors::{PmVaultError, Result};

/// Service name used in the OS keyring.
const SERVICE_NAME: &str = "pmvault";

fn entry(id: &str) -> Result<keyring::Entry> {
    keyring::Entry::new(SERVICE_NAME, &format!("session:{id}")).map_err(|e| {
        PmVaultError::StorageUnavailable(format!("failed to create keyring entry: {e}"))
    })
}

/// Store a value in the OS keyring.
pub fn store_secret(id: &str, value: &str) -> Result<()> {
    entry(id)?.set_password(value).map_err(|e| {
        PmVaultError::StorageUnavailable(format!("failed to store in keyring: {e}"))
    })
}

/// Retrieve a value from the OS keyring.
///
/// Returns `None` if nothing is stored (rather than an error).
pub fn get_secret(id: &str) -> Result<Option<String>> {
    match entry(id)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(PmVaultError::StorageUnavailable(format!(
            "failed to read from keyring: {e}"
        ))),
    }
}

/// Delete a stored value from the OS keyring.
pub fn delete_secret(id: &str) -> Result<()> {
    match entry(id)?.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()), // Already gone, that's fine.
        Err(e) => Err(PmVaultError::StorageUnavailable(format!(
            "failed to delete from keyring: {e}"
        ))),
    }
}
