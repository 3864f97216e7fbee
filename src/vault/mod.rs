//! Vault module — encrypted account storage.
//!
//! This module provides:
//! - `AccountRecord`, `SaveRecord` and `AccountEntry` types (`account`)
//! - The JSON document layout and atomic writes (`format`)
//! - The `AccountStorage` contract and `JsonAccountStore` (`store`)
//! - Reading a spreadsheet export of an existing vault (`sheet`)

pub mod account;
pub mod format;
pub mod sheet;
pub mod store;

// Re-export the most commonly used items.
pub use account::{
    next_index, open_account, seal_account, validate_site, AccountEntry, AccountRecord,
    SaveRecord,
};
pub use format::StoreDocument;
pub use sheet::{read_sheet_export, SheetExport, SheetRow};
pub use store::{AccountStorage, JsonAccountStore};
