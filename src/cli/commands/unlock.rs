//! `pmvault unlock` — unlock the master key once and cache it for the
//! session.
//!
//! Without a session token a fresh one is generated and printed as an
//! `export` line, so `eval "$(pmvault unlock)"` sets up the shell.

use crate::cli::output;
use crate::cli::{drive_unlock, session_token, Cli, Context, TerminalPrompt, SESSION_TOKEN_ENV};
use crate::crypto::SessionToken;
use crate::errors::Result;
use crate::session::UnlockStatus;

/// Execute the `unlock` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let store = ctx.open_store()?;

    let (token, generated) = match session_token(cli) {
        Some(token) => (token, false),
        None => (SessionToken::generate()?, true),
    };

    let mut manager = ctx.manager(ctx.persistent_cache()?)?;
    let status = manager.session_start(store.master_key()?.clone(), token.clone(), TerminalPrompt)?;

    match status {
        UnlockStatus::Unlocked => output::success("Session already unlocked."),
        UnlockStatus::AwaitingPassphrase => {
            drive_unlock(&mut manager, ctx.settings.max_passphrase_attempts)?;
            output::success("Vault unlocked for this session.");
        }
    }

    if generated {
        println!("export {SESSION_TOKEN_ENV}={}", token.expose());
    }

    Ok(())
}
