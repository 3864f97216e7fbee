//! Reading the spreadsheet export of an existing vault.
//!
//! ```text
//! row 1   <note>, <mk_pe>
//! row 2   Index, Site, Username, Password, Additional Info
//! row 3+  one account per row; secret cells hold envelope strings
//! ```
//!
//! Headers match case-insensitively, ignoring spaces and underscores.
//! A blank secret cell is an empty value, a blank `Index` falls back to
//! the row's position, and a blank `Site` gets a placeholder name.

use std::collections::HashSet;
use std::io;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use super::account::AccountRecord;
use crate::crypto::Envelope;
use crate::errors::{PmVaultError, Result};
use crate::session::{MasterKeyManager, SessionCache};

/// A parsed export: the passphrase-wrapped master key and its accounts.
#[derive(Debug)]
pub struct SheetExport {
    pub mk_pe: Envelope,
    pub rows: Vec<SheetRow>,
}

/// One account row.  `None` marks a blank secret cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based row number in the file.
    pub row: usize,
    pub index: u32,
    pub site: String,
    pub username: Option<Envelope>,
    pub password: Option<Envelope>,
    pub additional_info: Option<Envelope>,
}

impl SheetRow {
    /// Convert to a stored record, sealing blank cells as empty strings
    /// under the manager's live key.
    pub fn into_record<C: SessionCache>(
        self,
        manager: &MasterKeyManager<C>,
    ) -> Result<AccountRecord> {
        let filled = |cell: Option<Envelope>| match cell {
            Some(envelope) => Ok(envelope),
            None => manager.encrypt_str(""),
        };

        Ok(AccountRecord {
            index: self.index,
            site: self.site,
            username: filled(self.username)?,
            password: filled(self.password)?,
            additional_info: filled(self.additional_info)?,
        })
    }
}

struct Columns {
    index: Option<usize>,
    site: usize,
    username: Option<usize>,
    password: Option<usize>,
    additional_info: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| normalize(h) == name);

        Ok(Self {
            index: find("index"),
            site: find("site").ok_or_else(|| sheet_error("header row has no Site column"))?,
            username: find("username"),
            password: find("password"),
            additional_info: find("additionalinfo"),
        })
    }
}

fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn cell(record: &StringRecord, column: Option<usize>) -> &str {
    column
        .and_then(|c| record.get(c))
        .map(str::trim)
        .unwrap_or("")
}

fn sheet_error(msg: impl Into<String>) -> PmVaultError {
    PmVaultError::AccountStoreError(format!("spreadsheet export: {}", msg.into()))
}

fn envelope_cell(record: &StringRecord, column: Option<usize>, row: usize) -> Result<Option<Envelope>> {
    match cell(record, column) {
        "" => Ok(None),
        wire => Envelope::parse(wire)
            .map(Some)
            .map_err(|e| sheet_error(format!("row {row}: {e}"))),
    }
}

/// Parse a spreadsheet export.
pub fn read_sheet_export<R: io::Read>(reader: R) -> Result<SheetExport> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| sheet_error(format!("cannot read CSV: {e}")))?;

    if records.len() < 3 {
        return Err(sheet_error(
            "expected a master key row, a header row and at least one account row",
        ));
    }

    let mk_pe = match cell(&records[0], Some(1)) {
        "" => return Err(sheet_error("row 1 has no encrypted master key in its second cell")),
        wire => Envelope::parse(wire).map_err(|e| sheet_error(format!("row 1: {e}")))?,
    };
    let columns = Columns::from_headers(&records[1])?;

    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    for (offset, record) in records[2..].iter().enumerate() {
        let row = offset + 3;
        if record.iter().all(|c| c.trim().is_empty()) {
            debug!(row, "skipping blank row");
            continue;
        }

        let index = match cell(record, columns.index) {
            "" => u32::try_from(offset + 1)
                .map_err(|_| sheet_error(format!("row {row}: too many rows")))?,
            raw => raw
                .parse::<u32>()
                .map_err(|_| sheet_error(format!("row {row}: Index '{raw}' is not a number")))?,
        };
        if !seen.insert(index) {
            return Err(sheet_error(format!("row {row}: duplicate Index {index}")));
        }

        let site = match cell(record, Some(columns.site)) {
            "" => format!("[No site #{index}]"),
            site => site.to_string(),
        };

        rows.push(SheetRow {
            row,
            index,
            site,
            username: envelope_cell(record, columns.username, row)?,
            password: envelope_cell(record, columns.password, row)?,
            additional_info: envelope_cell(record, columns.additional_info, row)?,
        });
    }

    debug!(accounts = rows.len(), "spreadsheet export parsed");
    Ok(SheetExport { mk_pe, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Passphrase, SessionToken};
    use crate::session::MemorySessionCache;
    use crate::vault::open_account;

    fn unlocked() -> MasterKeyManager<MemorySessionCache> {
        let mut manager = MasterKeyManager::new(MemorySessionCache::new());
        manager
            .fresh_start(&Passphrase::new("pw"), SessionToken::new("t"))
            .unwrap();
        manager
    }

    fn sheet(manager: &MasterKeyManager<MemorySessionCache>, rows: &[&str]) -> String {
        let mk_pe = manager.mk_pe().unwrap();
        let mut csv = format!("Master key (do not edit),{mk_pe}\n");
        csv.push_str("Index,Site,Username,Password,Additional Info\n");
        for row in rows {
            csv.push_str(row);
            csv.push('\n');
        }
        csv
    }

    #[test]
    fn reads_master_key_and_rows() {
        let manager = unlocked();
        let user = manager.encrypt_str("alice").unwrap();
        let pass = manager.encrypt_str("s3cret").unwrap();
        let csv = sheet(&manager, &[&format!("1,example.com,{user},{pass},")]);

        let export = read_sheet_export(csv.as_bytes()).unwrap();
        assert_eq!(&export.mk_pe, manager.mk_pe().unwrap());
        assert_eq!(export.rows.len(), 1);

        let row = &export.rows[0];
        assert_eq!((row.row, row.index), (3, 1));
        assert_eq!(row.site, "example.com");
        assert_eq!(row.username.as_ref(), Some(&user));
        assert_eq!(row.password.as_ref(), Some(&pass));
        assert!(row.additional_info.is_none());
    }

    #[test]
    fn blank_cells_get_defaults() {
        let manager = unlocked();
        let pass = manager.encrypt_str("pw").unwrap();
        let csv = sheet(&manager, &[",,,,", &format!(",,,{pass},")]);
        let export = read_sheet_export(csv.as_bytes()).unwrap();

        assert_eq!(export.rows.len(), 1);
        assert_eq!(export.rows[0].index, 2);
        assert_eq!(export.rows[0].site, "[No site #2]");
    }

    #[test]
    fn blank_secret_cells_become_empty_values() {
        let manager = unlocked();
        let csv = sheet(&manager, &["7,example.com,,,"]);
        let row = read_sheet_export(csv.as_bytes()).unwrap().rows.remove(0);

        let record = row.into_record(&manager).unwrap();
        let entry = open_account(&manager, &record).unwrap();
        assert_eq!(record.index, 7);
        assert_eq!(entry.username.as_str(), "");
        assert_eq!(entry.password.as_str(), "");
        assert_eq!(entry.additional_info.as_str(), "");
    }

    #[test]
    fn headers_are_matched_loosely() {
        let manager = unlocked();
        let mk_pe = manager.mk_pe().unwrap();
        let csv = format!("note,{mk_pe}\nSITE,additional_info,index\nexample.com,,4\n");

        let export = read_sheet_export(csv.as_bytes()).unwrap();
        assert_eq!(export.rows[0].site, "example.com");
        assert_eq!(export.rows[0].index, 4);
    }

    #[test]
    fn malformed_secret_cell_names_the_row() {
        let manager = unlocked();
        let csv = sheet(&manager, &["1,a.com,,,", "2,b.com,not-an-envelope,,"]);

        let err = read_sheet_export(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 4"));
    }

    #[test]
    fn too_few_rows_is_rejected() {
        let manager = unlocked();
        let csv = sheet(&manager, &[]);
        assert!(matches!(
            read_sheet_export(csv.as_bytes()),
            Err(PmVaultError::AccountStoreError(_))
        ));
    }

    #[test]
    fn missing_site_column_is_rejected() {
        let manager = unlocked();
        let mk_pe = manager.mk_pe().unwrap();
        let csv = format!("note,{mk_pe}\nIndex,Username\n1,\n");

        let err = read_sheet_export(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Site column"));
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let manager = unlocked();
        let csv = sheet(&manager, &["1,a.com,,,", "1,b.com,,,"]);

        let err = read_sheet_export(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate Index 1"));
    }

    #[test]
    fn missing_master_key_is_rejected() {
        let csv = "note\nIndex,Site\n1,a.com\n";
        let err = read_sheet_export(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("encrypted master key"));
    }
}
