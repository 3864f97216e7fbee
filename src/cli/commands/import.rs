//! `pmvault import` — create a vault from a spreadsheet export.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use tracing::{info, warn};

use crate::cli::gitignore::ensure_ignored;
use crate::cli::output;
use crate::cli::{
    display_path, drive_unlock, session_token, Cli, Context, TerminalPrompt, SESSION_TOKEN_ENV,
};
use crate::crypto::SessionToken;
use crate::errors::{PmVaultError, Result};
use crate::session::UnlockStatus;
use crate::vault::{open_account, read_sheet_export, AccountStorage, JsonAccountStore, SaveRecord};

/// Execute the `import` command.
///
/// The export's `mk_pe` becomes the new vault's master key, so the
/// passphrase asked for is the one the export was made with.
pub fn execute(cli: &Cli, csv_path: &Path) -> Result<()> {
    let ctx = Context::load(cli)?;
    let store_path = ctx.store_path();

    // 1. Only import into a fresh vault directory.
    if store_path.exists() {
        return Err(PmVaultError::AccountStoreError(format!(
            "a vault already exists at {}; import needs an empty vault directory (see --vault-dir)",
            display_path(&ctx, &store_path)
        )));
    }

    // 2. Parse the export.
    let file = File::open(csv_path).map_err(|e| {
        PmVaultError::CommandFailed(format!("cannot open {}: {e}", csv_path.display()))
    })?;
    let sheet = read_sheet_export(file)?;
    output::notice(&format!(
        "Read {} account(s) from {}",
        sheet.rows.len(),
        csv_path.display()
    ));

    // 3. Unlock the export's master key.  A stale cache entry from an
    //    earlier vault in this directory must not answer for it.
    let (token, generated) = match session_token(cli) {
        Some(token) => (token, false),
        None => (SessionToken::generate()?, true),
    };
    let mut manager = ctx.manager(ctx.persistent_cache()?)?;
    manager.logout();
    if manager.session_start(sheet.mk_pe.clone(), token.clone(), TerminalPrompt)?
        == UnlockStatus::AwaitingPassphrase
    {
        drive_unlock(&mut manager, ctx.settings.max_passphrase_attempts)?;
    }

    // 4. Convert the rows, reporting any that do not open under the key.
    let mut sites = HashSet::new();
    let mut records = Vec::with_capacity(sheet.rows.len());
    let mut unreadable = 0usize;
    for row in sheet.rows {
        let line = row.row;
        let record = row.into_record(&manager)?;

        if !sites.insert(record.site.clone()) {
            output::warning(&format!(
                "Row {line}: site '{}' appears more than once; `get` will find the first",
                record.site
            ));
        }
        if let Err(e) = open_account(&manager, &record) {
            warn!(row = line, site = %record.site, error = %e, "imported account does not decrypt");
            output::warning(&format!(
                "Row {line}: '{}' could not be decrypted ({e}); imported as-is",
                record.site
            ));
            unreadable += 1;
        }
        records.push(SaveRecord::Account(record));
    }

    // 5. Persist `mk_pe` and the accounts.
    let mut store = JsonAccountStore::create(&store_path, sheet.mk_pe)?;
    store.save_accounts(&records)?;
    info!(path = %store_path.display(), accounts = records.len(), "vault imported");
    output::success(&format!(
        "Imported {} account(s) into {}",
        records.len(),
        display_path(&ctx, &store_path)
    ));
    if unreadable > 0 {
        output::tip(&format!(
            "{unreadable} account(s) could not be decrypted; re-enter them with `pmvault set`."
        ));
    }

    // 6. Keep the session cache file out of git.
    let cache_path = ctx.settings.session_cache_path(&ctx.project_dir);
    let cache_entry = display_path(&ctx, &cache_path);
    match ensure_ignored(&ctx.project_dir, &cache_entry) {
        Ok(true) => output::notice(&format!("Added '{cache_entry}' to .gitignore")),
        Ok(false) => {}
        Err(e) => output::warning(&format!("could not update .gitignore: {e}")),
    }

    if generated {
        output::tip("Session unlocked. To reuse it in this shell, run:");
        println!("export {}={}", SESSION_TOKEN_ENV, token.expose());
    }

    Ok(())
}
