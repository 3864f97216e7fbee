//! Account records and their plaintext form.
//!
//! An `AccountRecord` is what storage sees: the site name in clear and
//! three envelope fields.  An `AccountEntry` is the decrypted view the
//! host shows the user; its secret fields are wiped on drop.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::Envelope;
use crate::errors::{PmVaultError, Result};
use crate::session::{MasterKeyManager, SessionCache};

/// A stored account.  Field names match the deployed sheet columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(rename = "Index")]
    pub index: u32,

    #[serde(rename = "Site")]
    pub site: String,

    #[serde(rename = "Username")]
    pub username: Envelope,

    #[serde(rename = "Password")]
    pub password: Envelope,

    #[serde(rename = "AdditionalInfo")]
    pub additional_info: Envelope,
}

/// One item handed to `AccountStorage::save_accounts`.
///
/// The `MasterKey` sentinel tells storage to persist a new `mk_pe`
/// instead of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveRecord {
    MasterKey {
        master_key_passphrase_encrypted: Envelope,
    },
    Account(AccountRecord),
}

/// Decrypted account fields.
#[derive(Clone, Default)]
pub struct AccountEntry {
    pub site: String,
    pub username: Zeroizing<String>,
    pub password: Zeroizing<String>,
    pub additional_info: Zeroizing<String>,
}

impl AccountEntry {
    pub fn new(site: &str, username: &str, password: &str, additional_info: &str) -> Self {
        Self {
            site: site.to_string(),
            username: Zeroizing::new(username.to_string()),
            password: Zeroizing::new(password.to_string()),
            additional_info: Zeroizing::new(additional_info.to_string()),
        }
    }
}

/// Encrypt an entry's secret fields under the manager's live key.
pub fn seal_account<C: SessionCache>(
    manager: &MasterKeyManager<C>,
    index: u32,
    entry: &AccountEntry,
) -> Result<AccountRecord> {
    validate_site(&entry.site)?;

    Ok(AccountRecord {
        index,
        site: entry.site.clone(),
        username: manager.encrypt_str(&entry.username)?,
        password: manager.encrypt_str(&entry.password)?,
        additional_info: manager.encrypt_str(&entry.additional_info)?,
    })
}

/// Decrypt a record's secret fields under the manager's live key.
pub fn open_account<C: SessionCache>(
    manager: &MasterKeyManager<C>,
    record: &AccountRecord,
) -> Result<AccountEntry> {
    Ok(AccountEntry {
        site: record.site.clone(),
        username: manager.decrypt_string(&record.username)?,
        password: manager.decrypt_string(&record.password)?,
        additional_info: manager.decrypt_string(&record.additional_info)?,
    })
}

/// The index to give a new account: one past the highest in use, or 1
/// for an empty store.
pub fn next_index(records: &[AccountRecord]) -> Result<u32> {
    match records.iter().map(|r| r.index).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            PmVaultError::AccountStoreError(format!("no account index left after {max}"))
        }),
    }
}

/// Site names are stored in clear and used for lookup, so they must be
/// non-empty and free of surrounding whitespace.
pub fn validate_site(site: &str) -> Result<()> {
    if site.trim().is_empty() {
        return Err(PmVaultError::CommandFailed(
            "site name cannot be empty".into(),
        ));
    }
    if site.trim() != site {
        return Err(PmVaultError::CommandFailed(format!(
            "site name '{site}' has leading or trailing whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Passphrase, SessionToken};
    use crate::session::MemorySessionCache;

    fn unlocked() -> MasterKeyManager<MemorySessionCache> {
        let mut manager = MasterKeyManager::new(MemorySessionCache::new());
        manager
            .fresh_start(&Passphrase::new("pw"), SessionToken::new("t"))
            .unwrap();
        manager
    }

    #[test]
    fn seal_then_open_restores_fields() {
        let manager = unlocked();
        let entry = AccountEntry::new("example.com", "alice", "s3cret!", "pin 1234");

        let record = seal_account(&manager, 7, &entry).unwrap();
        assert_eq!(record.index, 7);
        assert_eq!(record.site, "example.com");

        let opened = open_account(&manager, &record).unwrap();
        assert_eq!(opened.username.as_str(), "alice");
        assert_eq!(opened.password.as_str(), "s3cret!");
        assert_eq!(opened.additional_info.as_str(), "pin 1234");
    }

    #[test]
    fn empty_notes_still_encrypt() {
        let manager = unlocked();
        let entry = AccountEntry::new("example.com", "alice", "pw", "");
        let record = seal_account(&manager, 1, &entry).unwrap();
        assert_eq!(
            open_account(&manager, &record).unwrap().additional_info.as_str(),
            ""
        );
    }

    #[test]
    fn record_uses_sheet_column_names() {
        let manager = unlocked();
        let record =
            seal_account(&manager, 3, &AccountEntry::new("site", "u", "p", "n")).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["Index"], 3);
        assert_eq!(json["Site"], "site");
        assert!(json["Username"].is_string());
        assert!(json["Password"].is_string());
        assert!(json["AdditionalInfo"].is_string());
    }

    #[test]
    fn save_record_sentinel_round_trips() {
        let manager = unlocked();
        let mk_pe = manager.mk_pe().unwrap().clone();
        let sentinel = SaveRecord::MasterKey {
            master_key_passphrase_encrypted: mk_pe,
        };

        let json = serde_json::to_string(&sentinel).unwrap();
        assert!(json.contains("master_key_passphrase_encrypted"));
        assert_eq!(serde_json::from_str::<SaveRecord>(&json).unwrap(), sentinel);
    }

    #[test]
    fn next_index_starts_at_one() {
        assert_eq!(next_index(&[]).unwrap(), 1);
    }

    #[test]
    fn next_index_follows_the_highest() {
        let manager = unlocked();
        let entry = AccountEntry::new("a", "u", "p", "");
        let records = vec![
            seal_account(&manager, 4, &entry).unwrap(),
            seal_account(&manager, 9, &entry).unwrap(),
            seal_account(&manager, 2, &entry).unwrap(),
        ];
        assert_eq!(next_index(&records).unwrap(), 10);
    }

    #[test]
    fn next_index_refuses_to_wrap() {
        let manager = unlocked();
        let entry = AccountEntry::new("a", "u", "p", "");
        let records = vec![seal_account(&manager, u32::MAX, &entry).unwrap()];
        assert!(matches!(
            next_index(&records),
            Err(PmVaultError::AccountStoreError(_))
        ));
    }

    #[test]
    fn blank_site_is_rejected() {
        assert!(validate_site("").is_err());
        assert!(validate_site("   ").is_err());
        assert!(validate_site(" padded ").is_err());
        assert!(validate_site("example.com").is_ok());
    }
}
