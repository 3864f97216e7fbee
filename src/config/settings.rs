use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::{EnvelopeCipher, KdfParams, SaltStrategy, SegmentEncoding};
use crate::errors::{PmVaultError, Result};

/// Project-level configuration, loaded from `.pmvault.toml`.
///
/// Every field has a default that matches the deployed wire format, so
/// pmvault works out-of-the-box without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to project root) holding the account store
    /// and the session cache file.
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,

    /// PBKDF2 iteration count (default: 100).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Hex-encoded PBKDF2 salt.  Unset means 32 zero bytes.
    #[serde(default)]
    pub kdf_salt_hex: Option<String>,

    /// Envelope segment encoding for newly sealed values.
    #[serde(default)]
    pub segment_encoding: SegmentEncoding,

    /// Which backend holds the session-encrypted master key.
    #[serde(default)]
    pub session_cache: SessionCacheKind,

    /// Seconds a cached session key stays valid.  `0` disables expiry.
    #[serde(default = "default_session_cache_max_age_secs")]
    pub session_cache_max_age_secs: u64,

    /// How many passphrase attempts the CLI allows before giving up.
    #[serde(default = "default_max_passphrase_attempts")]
    pub max_passphrase_attempts: u32,
}

/// Session cache backends the CLI can use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionCacheKind {
    #[default]
    File,
    /// OS keyring; needs the `keyring-store` feature.
    Keyring,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_dir() -> String {
    ".pmvault".to_string()
}

fn default_kdf_iterations() -> u32 {
    crate::crypto::kdf::LEGACY_ITERATIONS
}

fn default_session_cache_max_age_secs() -> u64 {
    3600 // 1 hour
}

fn default_max_passphrase_attempts() -> u32 {
    3
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_dir: default_vault_dir(),
            kdf_iterations: default_kdf_iterations(),
            kdf_salt_hex: None,
            segment_encoding: SegmentEncoding::default(),
            session_cache: SessionCacheKind::default(),
            session_cache_max_age_secs: default_session_cache_max_age_secs(),
            max_passphrase_attempts: default_max_passphrase_attempts(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".pmvault.toml";

    /// Load settings from `<project_dir>/.pmvault.toml`.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PmVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.max_passphrase_attempts == 0 {
            return Err(PmVaultError::ConfigError(
                "max_passphrase_attempts must be at least 1".into(),
            ));
        }

        Ok(settings)
    }

    /// Full path to the account store.
    ///
    /// Example: `project_dir/.pmvault/accounts.json`
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir).join("accounts.json")
    }

    /// Full path to the file-backed session cache.
    pub fn session_cache_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.vault_dir).join("session.json")
    }

    /// Session cache expiry, or `None` when disabled.
    pub fn session_max_age(&self) -> Option<chrono::Duration> {
        match self.session_cache_max_age_secs {
            0 => None,
            secs => i64::try_from(secs).ok().map(chrono::Duration::seconds),
        }
    }

    /// Convert the KDF settings into crypto-layer params.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        let salt = match &self.kdf_salt_hex {
            None => SaltStrategy::FixedZero,
            Some(salt_hex) => {
                let bytes = hex::decode(salt_hex.trim()).map_err(|e| {
                    PmVaultError::ConfigError(format!("kdf_salt_hex is not valid hex: {e}"))
                })?;
                if bytes.is_empty() {
                    return Err(PmVaultError::ConfigError("kdf_salt_hex is empty".into()));
                }
                SaltStrategy::Fixed(bytes)
            }
        };

        Ok(KdfParams {
            iterations: self.kdf_iterations,
            salt,
        })
    }

    /// Build the envelope cipher these settings describe.
    pub fn cipher(&self) -> Result<EnvelopeCipher> {
        Ok(EnvelopeCipher::new(self.kdf_params()?, self.segment_encoding))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
