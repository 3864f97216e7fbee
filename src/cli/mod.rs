//! CLI module — Clap argument parser, output helpers, and command implementations.
//!
//! The CLI is the host for the library's collaborators: it persists
//! accounts in a `JsonAccountStore`, keeps the session-wrapped master key
//! in a file (or OS keyring) cache, and answers passphrase requests from
//! the terminal.

pub mod commands;
pub mod gitignore;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::{SessionCacheKind, Settings};
use crate::crypto::{Passphrase, SessionToken};
use crate::errors::{PmVaultError, Result};
use crate::session::{
    FileSessionCache, MasterKeyManager, MemorySessionCache, PassphrasePrompt, SessionCache,
    UnlockStatus,
};
use crate::vault::JsonAccountStore;

/// Minimum passphrase length for new vaults.
const MIN_PASSPHRASE_LEN: usize = 8;

/// Env var holding the passphrase for scripted use.
pub const PASSPHRASE_ENV: &str = "PMVAULT_PASSPHRASE";

/// Env var holding the session token.
pub const SESSION_TOKEN_ENV: &str = "PMVAULT_SESSION_TOKEN";

/// pmvault CLI: encrypted password manager.
#[derive(Parser)]
#[command(name = "pmvault", about = "Encrypted password manager", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault directory (overrides `vault_dir` in .pmvault.toml)
    #[arg(long, global = true)]
    pub vault_dir: Option<String>,

    /// Session token that unlocks the cached master key
    #[arg(long, global = true, env = SESSION_TOKEN_ENV, hide_env_values = true)]
    pub session_token: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new vault and master key
    Init,

    /// Unlock the vault for this session (prints a session token if none is set)
    Unlock,

    /// Forget the cached session key
    Lock,

    /// Add or update an account
    Set {
        /// Site name (e.g. example.com)
        site: String,
        /// Login name (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Password (omit for piped input or an interactive prompt)
        #[arg(short, long)]
        password: Option<String>,
        /// Free-form notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Show an account
    Get {
        /// Site name
        site: String,
        /// Print the password in clear
        #[arg(long)]
        show: bool,
        /// Copy the password to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// List accounts
    List {
        /// Only show sites containing this text (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Delete an account
    Delete {
        /// Site name
        site: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the vault passphrase
    Passwd,

    /// Encrypt a value under the master key and print the envelope
    Encrypt {
        /// Plaintext (read from stdin if omitted)
        value: Option<String>,
    },

    /// Decrypt an envelope produced by `encrypt`
    Decrypt {
        /// Envelope string (read from stdin if omitted)
        envelope: Option<String>,
    },

    /// Create a vault from a spreadsheet export (CSV)
    Import {
        /// CSV file: master key row, header row, then one account per row
        csv: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolved project paths and settings for one CLI invocation.
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
}

impl Context {
    /// Load `.pmvault.toml` from the working directory and apply CLI
    /// overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let project_dir = std::env::current_dir()?;
        let mut settings = Settings::load(&project_dir)?;
        if let Some(dir) = &cli.vault_dir {
            settings.vault_dir = dir.clone();
        }
        Ok(Self {
            project_dir,
            settings,
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.settings.store_path(&self.project_dir)
    }

    pub fn open_store(&self) -> Result<JsonAccountStore> {
        JsonAccountStore::open(&self.store_path())
    }

    /// The session cache configured for this project.
    pub fn persistent_cache(&self) -> Result<Box<dyn SessionCache>> {
        match self.settings.session_cache {
            SessionCacheKind::File => {
                let mut cache =
                    FileSessionCache::new(self.settings.session_cache_path(&self.project_dir));
                if let Some(max_age) = self.settings.session_max_age() {
                    cache = cache.with_max_age(max_age);
                }
                Ok(Box::new(cache))
            }
            #[cfg(feature = "keyring-store")]
            SessionCacheKind::Keyring => Ok(Box::new(crate::session::KeyringSessionCache::new(
                self.store_path().to_string_lossy(),
            ))),
            #[cfg(not(feature = "keyring-store"))]
            SessionCacheKind::Keyring => Err(PmVaultError::ConfigError(
                "session_cache = \"keyring\" needs pmvault built with the `keyring-store` feature"
                    .into(),
            )),
        }
    }

    pub fn manager(&self, cache: Box<dyn SessionCache>) -> Result<Manager> {
        Ok(MasterKeyManager::with_cipher(cache, self.settings.cipher()?))
    }
}

/// The manager type the CLI drives.
pub type Manager = MasterKeyManager<Box<dyn SessionCache>>;

/// An unlocked manager together with the store it belongs to.
pub struct Session {
    pub ctx: Context,
    pub store: JsonAccountStore,
    pub manager: Manager,
}

/// Open the store and unlock its master key.
///
/// With a session token the configured cache is tried first, so a
/// previous `pmvault unlock` avoids the passphrase prompt.  Without one
/// the key lives only for this command.
pub fn open_session(cli: &Cli) -> Result<Session> {
    let ctx = Context::load(cli)?;
    let store = ctx.open_store()?;

    let (cache, token) = match session_token(cli) {
        Some(token) => (ctx.persistent_cache()?, token),
        None => {
            debug!("no session token, using a throwaway cache");
            let cache: Box<dyn SessionCache> = Box::new(MemorySessionCache::new());
            (cache, SessionToken::generate()?)
        }
    };

    let mut manager = ctx.manager(cache)?;
    let status = manager.session_start(store.master_key()?.clone(), token, TerminalPrompt)?;
    if status == UnlockStatus::AwaitingPassphrase {
        drive_unlock(&mut manager, ctx.settings.max_passphrase_attempts)?;
    }

    Ok(Session {
        ctx,
        store,
        manager,
    })
}

/// Feed passphrases into a manager in the `Unlocking` state until it
/// unlocks or the attempt cap is reached.
///
/// A passphrase taken from `PMVAULT_PASSPHRASE` gets exactly one try.
pub fn drive_unlock(manager: &mut Manager, max_attempts: u32) -> Result<()> {
    if let Some(passphrase) = passphrase_from_env() {
        return match manager.unlock_with_passphrase(&passphrase)? {
            UnlockStatus::Unlocked => Ok(()),
            UnlockStatus::AwaitingPassphrase => Err(PmVaultError::AuthenticationFailure),
        };
    }

    for _ in 0..max_attempts {
        let passphrase = prompt_passphrase()?;
        if manager.unlock_with_passphrase(&passphrase)? == UnlockStatus::Unlocked {
            return Ok(());
        }
    }

    Err(PmVaultError::TooManyAttempts(max_attempts))
}

/// Answers the manager's passphrase requests on the terminal.
///
/// The manager only signals that a passphrase is needed; `drive_unlock`
/// collects it.
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn request_passphrase(&self, retry_hint: Option<&str>) {
        match retry_hint {
            Some(hint) => output::warning(hint),
            None => output::notice("Vault is locked."),
        }
    }
}

/// The session token from `--session-token` / `PMVAULT_SESSION_TOKEN`.
pub fn session_token(cli: &Cli) -> Option<SessionToken> {
    cli.session_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(SessionToken::from)
}

fn passphrase_from_env() -> Option<Passphrase> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(|pw| Passphrase::from(Zeroizing::new(pw)))
}

/// Get the vault passphrase, trying in order:
/// 1. `PMVAULT_PASSPHRASE` env var (scripts)
/// 2. Interactive prompt
pub fn prompt_passphrase() -> Result<Passphrase> {
    if let Some(passphrase) = passphrase_from_env() {
        return Ok(passphrase);
    }

    require_terminal(PASSPHRASE_ENV)?;
    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault passphrase")
        .interact()
        .map_err(|e| PmVaultError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Passphrase::from(Zeroizing::new(pw)))
}

/// Prompt for a new passphrase with confirmation (used by `init` and
/// `passwd`).
///
/// Also respects `PMVAULT_PASSPHRASE` for scripted usage.
/// Enforces a minimum length.
pub fn prompt_new_passphrase() -> Result<Passphrase> {
    if let Some(passphrase) = passphrase_from_env() {
        check_passphrase_len(&passphrase)?;
        return Ok(passphrase);
    }

    require_terminal(PASSPHRASE_ENV)?;
    loop {
        let pw = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Choose vault passphrase")
                .with_confirmation(
                    "Confirm vault passphrase",
                    "Passphrases do not match, try again",
                )
                .interact()
                .map_err(|e| PmVaultError::CommandFailed(format!("passphrase prompt: {e}")))?,
        );
        let passphrase = Passphrase::from(pw);

        if let Err(e) = check_passphrase_len(&passphrase) {
            output::warning(&format!("{e}. Try again."));
            continue;
        }

        return Ok(passphrase);
    }
}

/// Fail early instead of prompting when nobody can answer.
///
/// `hint` names what the caller can supply instead, e.g. an env var.
pub fn require_terminal(hint: &str) -> Result<()> {
    use std::io::IsTerminal;

    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(PmVaultError::CommandFailed(format!(
            "no terminal to prompt on (use {hint})"
        )))
    }
}

pub(crate) fn check_passphrase_len(passphrase: &Passphrase) -> Result<()> {
    if passphrase.as_str().chars().count() < MIN_PASSPHRASE_LEN {
        return Err(PmVaultError::CommandFailed(format!(
            "passphrase must be at least {MIN_PASSPHRASE_LEN} characters"
        )));
    }
    Ok(())
}

/// Read a value from the argument, or from stdin when it is piped.
pub fn value_or_stdin(value: Option<&str>, what: &str) -> Result<Zeroizing<String>> {
    use std::io::{self, IsTerminal, Read};

    if let Some(v) = value {
        return Ok(Zeroizing::new(v.to_string()));
    }
    if io::stdin().is_terminal() {
        return Err(PmVaultError::CommandFailed(format!(
            "no {what} given (pass it as an argument or pipe it on stdin)"
        )));
    }

    let mut buf = Zeroizing::new(String::new());
    io::stdin().read_to_string(&mut buf)?;
    let trimmed_len = buf.trim_end().len();
    buf.truncate(trimmed_len);
    Ok(buf)
}

/// Display form of a path relative to the project, for messages.
pub fn display_path(ctx: &Context, path: &Path) -> String {
    path.strip_prefix(&ctx.project_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}
