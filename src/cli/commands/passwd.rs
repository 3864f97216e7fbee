//! `pmvault passwd` — change the vault passphrase.
//!
//! Only `mk_pe` changes: the master key stays the same, so account
//! envelopes and the session cache remain valid.

use crate::cli::output;
use crate::cli::{
    check_passphrase_len, open_session, prompt_new_passphrase, Cli, PASSPHRASE_ENV,
};
use crate::crypto::Passphrase;
use crate::errors::{PmVaultError, Result};
use crate::vault::{AccountStorage, SaveRecord};

/// Env var holding the new passphrase for scripted use.
pub const NEW_PASSPHRASE_ENV: &str = "PMVAULT_NEW_PASSPHRASE";

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let mut session = open_session(cli)?;

    let new_passphrase = match std::env::var(NEW_PASSPHRASE_ENV) {
        Ok(pw) if !pw.is_empty() => {
            let passphrase = Passphrase::new(pw);
            check_passphrase_len(&passphrase)?;
            passphrase
        }
        _ if std::env::var_os(PASSPHRASE_ENV).is_some() => {
            return Err(PmVaultError::CommandFailed(format!(
                "set {NEW_PASSPHRASE_ENV} when {PASSPHRASE_ENV} is used"
            )))
        }
        _ => {
            output::notice("Choose your new vault passphrase.");
            prompt_new_passphrase()?
        }
    };

    let mk_pe = session.manager.change_passphrase(&new_passphrase)?;
    session.store.save_accounts(&[SaveRecord::MasterKey {
        master_key_passphrase_encrypted: mk_pe,
    }])?;

    output::success("Passphrase changed.");
    Ok(())
}
