//! `pmvault delete` — remove an account from the vault.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{open_session, require_terminal, Cli};
use crate::errors::{PmVaultError, Result};
use crate::vault::AccountStorage;

/// Execute the `delete` command.
pub fn execute(cli: &Cli, site: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        require_terminal("--force")?;
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete account '{site}'?"))
            .default(false)
            .interact()
            .map_err(|e| PmVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            return Err(PmVaultError::UserCancelled);
        }
    }

    // Deleting only touches the store, but unlocking first proves the
    // caller knows the passphrase (or holds the session).
    let mut session = open_session(cli)?;

    let index = session
        .store
        .find_by_site(site)
        .map(|r| r.index)
        .ok_or_else(|| PmVaultError::AccountNotFound(site.to_string()))?;
    session.store.delete_account(index)?;

    output::success(&format!("Deleted account '{site}'"));
    Ok(())
}
