//! One module per subcommand.  Each exposes an `execute` function that
//! `main` dispatches to.

pub mod completions;
pub mod delete;
pub mod get;
pub mod import;
pub mod init;
pub mod list;
pub mod lock;
pub mod passwd;
pub mod secret;
pub mod set;
pub mod unlock;
