//! `pmvault encrypt` / `pmvault decrypt` — seal arbitrary values under
//! the master key.

use crate::cli::{open_session, value_or_stdin, Cli};
use crate::crypto::Envelope;
use crate::errors::Result;

/// Execute the `encrypt` command.
pub fn execute_encrypt(cli: &Cli, value: Option<&str>) -> Result<()> {
    let plaintext = value_or_stdin(value, "value")?;
    let session = open_session(cli)?;

    let envelope = session.manager.encrypt_str(&plaintext)?;
    println!("{envelope}");
    Ok(())
}

/// Execute the `decrypt` command.
pub fn execute_decrypt(cli: &Cli, envelope: Option<&str>) -> Result<()> {
    let wire = value_or_stdin(envelope, "envelope")?;
    let envelope = Envelope::parse(wire.trim())?;
    let session = open_session(cli)?;

    let plaintext = session.manager.decrypt_string(&envelope)?;
    println!("{}", plaintext.as_str());
    Ok(())
}
