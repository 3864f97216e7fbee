//! `pmvault set` — add or update an account.

use std::io::{self, IsTerminal};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{open_session, require_terminal, value_or_stdin, Cli};
use crate::errors::{PmVaultError, Result};
use crate::vault::{next_index, seal_account, validate_site, AccountEntry, AccountStorage, SaveRecord};

/// Execute the `set` command.
pub fn execute(
    cli: &Cli,
    site: &str,
    username: Option<&str>,
    password: Option<&str>,
    notes: &str,
) -> Result<()> {
    validate_site(site)?;

    let username = match username {
        Some(u) => u.to_string(),
        None => {
            require_terminal("--username")?;
            dialoguer::Input::<String>::new()
                .with_prompt(format!("Username for {site}"))
                .interact_text()
                .map_err(|e| PmVaultError::CommandFailed(format!("input prompt: {e}")))?
        }
    };

    // Determine the password from one of three sources.
    let password = if let Some(p) = password {
        // Source 1: Inline value on the command line.
        output::warning("Password provided on command line — it may appear in shell history.");
        Zeroizing::new(p.to_string())
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input (stdin is not a terminal).
        value_or_stdin(None, "password")?
    } else {
        // Source 3: Interactive secure prompt (default).
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Password for {site}"))
                .interact()
                .map_err(|e| PmVaultError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    let mut session = open_session(cli)?;

    // An existing site keeps its index; a new one goes after the highest.
    let existing = session.store.find_by_site(site).map(|r| r.index);
    let index = match existing {
        Some(index) => index,
        None => next_index(&session.store.get_accounts()?)?,
    };

    let entry = AccountEntry::new(site, &username, &password, notes);
    let record = seal_account(&session.manager, index, &entry)?;
    session
        .store
        .save_accounts(&[SaveRecord::Account(record)])?;

    let verb = if existing.is_some() { "updated" } else { "added" };
    output::success(&format!(
        "Account '{site}' {verb} ({} total)",
        session.store.account_count()
    ));

    Ok(())
}
