//! On-disk layout of the account store.
//!
//! `accounts.json` is a plain JSON document.  Every secret inside it is
//! already an envelope string, so the file needs no extra integrity
//! layer: tampering with any field fails GCM authentication on read.
//!
//! ```json
//! {
//!   "version": 1,
//!   "master_key_passphrase_encrypted": "<envelope>",
//!   "accounts": [
//!     { "Index": 1, "Site": "example.com", "Username": "<envelope>",
//!       "Password": "<envelope>", "AdditionalInfo": "<envelope>" }
//!   ]
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::account::AccountRecord;
use crate::crypto::Envelope;
use crate::errors::{PmVaultError, Result};

/// Current document version.
pub const CURRENT_VERSION: u8 = 1;

/// The whole account store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u8,

    /// The durable passphrase-wrapped master key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_key_passphrase_encrypted: Option<Envelope>,

    #[serde(default)]
    pub accounts: Vec<AccountRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            master_key_passphrase_encrypted: None,
            accounts: Vec::new(),
        }
    }
}

/// Read and parse a store document.
pub fn read_document(path: &Path) -> Result<StoreDocument> {
    let contents = fs::read_to_string(path)?;

    let doc: StoreDocument = serde_json::from_str(&contents).map_err(|e| {
        PmVaultError::AccountStoreError(format!("cannot parse {}: {e}", path.display()))
    })?;

    if doc.version != CURRENT_VERSION {
        return Err(PmVaultError::AccountStoreError(format!(
            "unsupported store version {}, expected {CURRENT_VERSION}",
            doc.version
        )));
    }

    Ok(doc)
}

/// Serialize a store document and write it atomically.
pub fn write_document(path: &Path, doc: &StoreDocument) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(doc)
        .map_err(|e| PmVaultError::SerializationError(format!("account store: {e}")))?;
    write_atomic(path, &bytes)?;
    Ok(())
}

/// Write `bytes` to `path` **atomically** with owner-only permissions.
///
/// 1. Write to a temp file in the same directory.
/// 2. Restrict it to 0600 (Unix).
/// 3. Rename it over the target path.
///
/// The rename ensures readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    if !parent.as_os_str().is_empty() && !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)
}
