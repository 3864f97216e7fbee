//! `pmvault init` — create a new vault and its master key.

use tracing::info;

use crate::cli::gitignore::ensure_ignored;
use crate::cli::output;
use crate::cli::{display_path, prompt_new_passphrase, session_token, Cli, Context};
use crate::crypto::SessionToken;
use crate::errors::{PmVaultError, Result};
use crate::vault::JsonAccountStore;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let store_path = ctx.store_path();

    // 1. Refuse to overwrite an existing vault.
    if store_path.exists() {
        output::tip("Use `pmvault set` to add accounts to the existing vault.");
        return Err(PmVaultError::AccountStoreError(format!(
            "a vault already exists at {}",
            display_path(&ctx, &store_path)
        )));
    }

    // 2. Choose the passphrase and session token.
    let passphrase = prompt_new_passphrase()?;
    let (token, generated) = match session_token(cli) {
        Some(token) => (token, false),
        None => (SessionToken::generate()?, true),
    };

    // 3. Generate the master key; the manager caches it under the token.
    let mut manager = ctx.manager(ctx.persistent_cache()?)?;
    let mk_pe = manager.fresh_start(&passphrase, token.clone())?;

    // 4. Persist `mk_pe`.
    JsonAccountStore::create(&store_path, mk_pe)?;
    info!(path = %store_path.display(), "vault initialized");
    output::success(&format!(
        "Vault created at {}",
        display_path(&ctx, &store_path)
    ));

    // 5. Keep the session cache file out of git.
    let cache_path = ctx.settings.session_cache_path(&ctx.project_dir);
    let cache_entry = display_path(&ctx, &cache_path);
    match ensure_ignored(&ctx.project_dir, &cache_entry) {
        Ok(true) => output::notice(&format!("Added '{cache_entry}' to .gitignore")),
        Ok(false) => {}
        Err(e) => output::warning(&format!("could not update .gitignore: {e}")),
    }

    // 6. Hand out the session token if we made one up.
    if generated {
        output::tip("Session unlocked. To reuse it in this shell, run:");
        println!("export {}={}", crate::cli::SESSION_TOKEN_ENV, token.expose());
    }
    output::tip("Run `pmvault set <SITE>` to add an account.");

    Ok(())
}
