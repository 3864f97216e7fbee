//! Configuration module.
//!
//! Settings come from an optional `.pmvault.toml` in the project root.

pub mod settings;

pub use settings::{SessionCacheKind, Settings};
