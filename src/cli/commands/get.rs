//! `pmvault get` — show one account, optionally copying its password.

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::{PmVaultError, Result};
use crate::vault::open_account;

/// Execute the `get` command.
pub fn execute(cli: &Cli, site: &str, show: bool, copy: bool) -> Result<()> {
    let session = open_session(cli)?;

    let record = session
        .store
        .find_by_site(site)
        .ok_or_else(|| PmVaultError::AccountNotFound(site.to_string()))?;
    let entry = open_account(&session.manager, record)?;

    output::print_account(&entry, show);

    if copy {
        copy_to_clipboard(&entry.password)?;
        output::success(&format!("Password for '{site}' copied to clipboard."));
    }

    Ok(())
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| PmVaultError::CommandFailed(format!("clipboard unavailable: {e}")))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| PmVaultError::CommandFailed(format!("clipboard write failed: {e}")))
}
