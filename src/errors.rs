use thiserror::Error;

/// All errors that can occur in pmvault.
#[derive(Debug, Error)]
pub enum PmVaultError {
    // --- Envelope errors ---
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Authentication failed — wrong key or passphrase, or corrupted data")]
    AuthenticationFailure,

    #[error("Cryptographic provider failure: {0}")]
    ProviderFailure(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Master key errors ---
    #[error("Master key not available — unlock the vault first")]
    KeyNotAvailable,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Too many failed passphrase attempts ({0})")]
    TooManyAttempts(u32),

    // --- Storage errors ---
    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Account store error: {0}")]
    AccountStoreError(String),

    #[error("Account '{0}' not found")]
    AccountNotFound(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Convenience type alias for pmvault results.
pub type Result<T> = std::result::Result<T, PmVaultError>;
