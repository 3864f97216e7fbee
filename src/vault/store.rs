//! Account storage.
//!
//! `AccountStorage` is the collaborator contract the host fulfils:
//! get all records, save a batch, delete by index.  `JsonAccountStore`
//! is the file-backed implementation used by the CLI; it keeps the whole
//! document in memory and rewrites it atomically after every change.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::account::{AccountRecord, SaveRecord};
use super::format::{self, StoreDocument};
use crate::crypto::Envelope;
use crate::errors::{PmVaultError, Result};

/// Persistence for account records and the durable `mk_pe`.
pub trait AccountStorage {
    /// All stored accounts, in index order.
    fn get_accounts(&self) -> Result<Vec<AccountRecord>>;

    /// Persist a batch.  An account whose index already exists replaces
    /// it; the `MasterKey` sentinel replaces the stored `mk_pe`.
    fn save_accounts(&mut self, records: &[SaveRecord]) -> Result<()>;

    /// Remove the account with `index`.
    fn delete_account(&mut self, index: u32) -> Result<()>;
}

/// JSON-file account store.
#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl JsonAccountStore {
    /// Create a new store at `path` holding `mk_pe` and no accounts.
    pub fn create(path: &Path, mk_pe: Envelope) -> Result<Self> {
        if path.exists() {
            return Err(PmVaultError::AccountStoreError(format!(
                "a vault already exists at {}",
                path.display()
            )));
        }

        let mut store = Self {
            path: path.to_path_buf(),
            doc: StoreDocument::default(),
        };
        store.save_accounts(&[SaveRecord::MasterKey {
            master_key_passphrase_encrypted: mk_pe,
        }])?;

        debug!(path = %path.display(), "account store created");
        Ok(store)
    }

    /// Open an existing store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PmVaultError::AccountStoreError(format!(
                "no vault found at {} (run `pmvault init` first)",
                path.display()
            )));
        }

        let doc = format::read_document(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// The stored passphrase-wrapped master key.
    pub fn master_key(&self) -> Result<&Envelope> {
        self.doc
            .master_key_passphrase_encrypted
            .as_ref()
            .ok_or_else(|| {
                PmVaultError::AccountStoreError("store has no encrypted master key".into())
            })
    }

    /// Look up an account by its site name.
    pub fn find_by_site(&self, site: &str) -> Option<&AccountRecord> {
        self.doc.accounts.iter().find(|r| r.site == site)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn account_count(&self) -> usize {
        self.doc.accounts.len()
    }

    /// Write `doc` and only then make it the in-memory state.
    fn commit(&mut self, doc: StoreDocument) -> Result<()> {
        format::write_document(&self.path, &doc)?;
        self.doc = doc;
        Ok(())
    }
}

impl AccountStorage for JsonAccountStore {
    fn get_accounts(&self) -> Result<Vec<AccountRecord>> {
        let mut accounts = self.doc.accounts.clone();
        accounts.sort_by_key(|r| r.index);
        Ok(accounts)
    }

    fn save_accounts(&mut self, records: &[SaveRecord]) -> Result<()> {
        let mut doc = self.doc.clone();
        for record in records {
            match record {
                SaveRecord::MasterKey {
                    master_key_passphrase_encrypted,
                } => {
                    doc.master_key_passphrase_encrypted =
                        Some(master_key_passphrase_encrypted.clone());
                }
                SaveRecord::Account(account) => {
                    match doc.accounts.iter_mut().find(|r| r.index == account.index) {
                        Some(existing) => *existing = account.clone(),
                        None => doc.accounts.push(account.clone()),
                    }
                }
            }
        }

        self.commit(doc)
    }

    fn delete_account(&mut self, index: u32) -> Result<()> {
        let mut doc = self.doc.clone();
        let before = doc.accounts.len();
        doc.accounts.retain(|r| r.index != index);
        if doc.accounts.len() == before {
            return Err(PmVaultError::AccountNotFound(format!("#{index}")));
        }

        self.commit(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Passphrase, SessionToken};
    use crate::session::{MasterKeyManager, MemorySessionCache};
    use crate::vault::account::{seal_account, AccountEntry};
    use tempfile::TempDir;

    fn manager() -> MasterKeyManager<MemorySessionCache> {
        let mut manager = MasterKeyManager::new(MemorySessionCache::new());
        manager
            .fresh_start(&Passphrase::new("pw"), SessionToken::new("t"))
            .unwrap();
        manager
    }

    fn record(manager: &MasterKeyManager<MemorySessionCache>, index: u32, site: &str) -> SaveRecord {
        let entry = AccountEntry::new(site, "user", "pass", "");
        SaveRecord::Account(seal_account(manager, index, &entry).unwrap())
    }

    #[test]
    fn create_persists_master_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mk_pe = manager.mk_pe().unwrap().clone();

        JsonAccountStore::create(&path, mk_pe.clone()).unwrap();

        let reopened = JsonAccountStore::open(&path).unwrap();
        assert_eq!(reopened.master_key().unwrap(), &mk_pe);
        assert!(reopened.get_accounts().unwrap().is_empty());
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let mk_pe = manager().mk_pe().unwrap().clone();

        JsonAccountStore::create(&path, mk_pe.clone()).unwrap();
        assert!(matches!(
            JsonAccountStore::create(&path, mk_pe),
            Err(PmVaultError::AccountStoreError(_))
        ));
    }

    #[test]
    fn open_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        let err = JsonAccountStore::open(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("pmvault init"));
    }

    #[test]
    fn save_appends_and_replaces_by_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();

        store
            .save_accounts(&[record(&manager, 2, "b.com"), record(&manager, 1, "a.com")])
            .unwrap();
        store.save_accounts(&[record(&manager, 2, "c.com")]).unwrap();

        let accounts = JsonAccountStore::open(&path).unwrap().get_accounts().unwrap();
        let sites: Vec<_> = accounts.iter().map(|r| r.site.as_str()).collect();
        assert_eq!(sites, ["a.com", "c.com"]);
    }

    #[test]
    fn sentinel_replaces_master_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let mut manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();

        let rewrapped = manager.change_passphrase(&Passphrase::new("new")).unwrap();
        store
            .save_accounts(&[SaveRecord::MasterKey {
                master_key_passphrase_encrypted: rewrapped.clone(),
            }])
            .unwrap();

        assert_eq!(
            JsonAccountStore::open(&path).unwrap().master_key().unwrap(),
            &rewrapped
        );
    }

    #[test]
    fn delete_removes_account() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();
        store.save_accounts(&[record(&manager, 1, "a.com")]).unwrap();

        store.delete_account(1).unwrap();
        assert_eq!(JsonAccountStore::open(&path).unwrap().account_count(), 0);
    }

    #[test]
    fn delete_missing_index_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let mut store =
            JsonAccountStore::create(&path, manager().mk_pe().unwrap().clone()).unwrap();

        assert!(matches!(
            store.delete_account(42),
            Err(PmVaultError::AccountNotFound(_))
        ));
    }

    /// Replace the store file with a directory so the next write fails.
    fn block_writes(path: &Path) {
        std::fs::remove_file(path).unwrap();
        std::fs::create_dir(path).unwrap();
    }

    #[test]
    fn failed_save_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();
        store.save_accounts(&[record(&manager, 1, "a.com")]).unwrap();

        block_writes(&path);
        assert!(store
            .save_accounts(&[record(&manager, 1, "b.com"), record(&manager, 2, "c.com")])
            .is_err());

        let sites: Vec<_> = store
            .get_accounts()
            .unwrap()
            .into_iter()
            .map(|r| r.site)
            .collect();
        assert_eq!(sites, ["a.com"]);
    }

    #[test]
    fn failed_delete_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();
        store.save_accounts(&[record(&manager, 1, "a.com")]).unwrap();

        block_writes(&path);
        assert!(store.delete_account(1).is_err());
        assert_eq!(store.account_count(), 1);
        assert!(store.find_by_site("a.com").is_some());
    }

    #[test]
    fn find_by_site_matches_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let manager = manager();
        let mut store = JsonAccountStore::create(&path, manager.mk_pe().unwrap().clone()).unwrap();
        store.save_accounts(&[record(&manager, 5, "a.com")]).unwrap();

        assert_eq!(store.find_by_site("a.com").map(|r| r.index), Some(5));
        assert!(store.find_by_site("A.com").is_none());
    }
}
