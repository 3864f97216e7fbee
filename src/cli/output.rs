//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.  Anything that is not the
//! command's actual result goes to stderr, so `pmvault get --show` and
//! `pmvault encrypt` stay pipeable.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{AccountEntry, AccountRecord};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    eprintln!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Like `info`, but on stderr.
pub fn notice(msg: &str) {
    eprintln!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    eprintln!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Mask shown in place of a password.
pub const MASK: &str = "********";

/// Shown in place of the fields of a record that failed to decrypt.
pub const UNREADABLE: &str = "\u{26a0} could not decrypt";

/// Print a table of accounts (Index, Site, Username, Notes).
///
/// A row whose entry is `None` could not be decrypted; only its index
/// and site name are shown.
pub fn print_accounts_table(accounts: &[(&AccountRecord, Option<AccountEntry>)]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Site", "Username", "Notes"]);

    for (record, entry) in accounts {
        let (username, notes) = match entry {
            Some(entry) => (
                entry.username.as_str().to_string(),
                entry.additional_info.as_str().to_string(),
            ),
            None => (UNREADABLE.to_string(), String::new()),
        };
        table.add_row(vec![
            record.index.to_string(),
            record.site.clone(),
            username,
            notes,
        ]);
    }

    println!("{table}");
}

/// Print one account as `field: value` lines.
pub fn print_account(entry: &AccountEntry, show_password: bool) {
    let password = if show_password {
        entry.password.as_str()
    } else {
        MASK
    };

    println!("{} {}", style("Site:    ").bold(), entry.site);
    println!("{} {}", style("Username:").bold(), entry.username.as_str());
    println!("{} {}", style("Password:").bold(), password);
    if !entry.additional_info.is_empty() {
        println!("{} {}", style("Notes:   ").bold(), entry.additional_info.as_str());
    }
}
