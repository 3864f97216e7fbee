//! Keep the session cache out of version control.
//!
//! `accounts.json` only holds envelopes and may be committed or synced,
//! but `session.json` is unlockable by anyone who knows the session
//! token, so `init` lists it in `.gitignore`.

use std::fs;
use std::io;
use std::path::Path;

/// Ensure `entry` appears as a line in `<project_dir>/.gitignore`.
///
/// Returns `true` if the file was changed.
pub fn ensure_ignored(project_dir: &Path, entry: &str) -> io::Result<bool> {
    let gitignore_path = project_dir.join(".gitignore");

    let existing = match fs::read_to_string(&gitignore_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let wanted = entry.trim_start_matches('/');
    if existing
        .lines()
        .map(|line| line.trim().trim_start_matches('/'))
        .any(|line| line == wanted)
    {
        return Ok(false);
    }

    let separator = if existing.ends_with('\n') || existing.is_empty() {
        ""
    } else {
        "\n"
    };
    fs::write(&gitignore_path, format!("{existing}{separator}{entry}\n"))?;
    Ok(true)
}
