//! `pmvault list` — display accounts in a table, optionally filtered by
//! site name.

use tracing::warn;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;
use crate::vault::{open_account, AccountRecord, AccountStorage};

/// Execute the `list` command.
///
/// A record that fails to decrypt is still listed by site, with its
/// fields replaced by a marker, and does not stop the listing.
pub fn execute(cli: &Cli, search: Option<&str>) -> Result<()> {
    let session = open_session(cli)?;

    let records = session.store.get_accounts()?;
    if records.is_empty() {
        output::info("No accounts in this vault yet.");
        output::tip("Run `pmvault set <SITE>` to add your first account.");
        return Ok(());
    }

    let matching: Vec<&AccountRecord> = records
        .iter()
        .filter(|r| search.map_or(true, |term| site_matches(&r.site, term)))
        .collect();

    if matching.is_empty() {
        output::info(&format!(
            "No accounts match '{}'.",
            search.unwrap_or_default()
        ));
        return Ok(());
    }

    let mut unreadable = 0usize;
    let rows: Vec<_> = matching
        .into_iter()
        .map(|record| match open_account(&session.manager, record) {
            Ok(entry) => (record, Some(entry)),
            Err(e) => {
                warn!(site = %record.site, error = %e, "account could not be decrypted");
                output::warning(&format!("Could not decrypt '{}': {e}", record.site));
                unreadable += 1;
                (record, None)
            }
        })
        .collect();

    match search {
        Some(term) => output::info(&format!(
            "{} of {} account(s) match '{term}'",
            rows.len(),
            records.len()
        )),
        None => output::info(&format!("{} account(s)", rows.len())),
    }
    output::print_accounts_table(&rows);

    if unreadable > 0 {
        output::tip(&format!(
            "{unreadable} account(s) could not be decrypted; re-enter them with `pmvault set`."
        ));
    }

    Ok(())
}

/// Case-insensitive substring match on the site name.
pub fn site_matches(site: &str, term: &str) -> bool {
    site.to_lowercase().contains(&term.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ignores_case() {
        assert!(site_matches("GitHub.com", "github"));
        assert!(site_matches("mail.example.org", "EXAMPLE"));
        assert!(!site_matches("example.com", "gitlab"));
    }

    #[test]
    fn empty_term_matches_everything() {
        assert!(site_matches("example.com", ""));
    }
}
