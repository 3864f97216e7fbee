//! `pmvault lock` — forget the cached session key.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::Result;

/// Execute the `lock` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;

    let mut manager = ctx.manager(ctx.persistent_cache()?)?;
    manager.logout();

    output::success("Session locked. The next command will ask for the passphrase.");
    Ok(())
}
