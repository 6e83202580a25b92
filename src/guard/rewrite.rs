//! Atomic interpreter rewrite.
//!
//! The new contents are written to a temp file in the script's own directory
//! and renamed over the original, so a reader sees either the old script or
//! the rewritten one, never a torn mix. Permissions carry over. A symlinked
//! script is rewritten through the link; the link itself stays a link.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::core::errors::{GuardError, Result};

/// Prefix of the temp files created next to a script during a rewrite.
pub const TEMP_PREFIX: &str = ".bash-guard-";

/// Suffix of the temp files created next to a script during a rewrite.
pub const TEMP_SUFFIX: &str = ".tmp";

/// `line` + `\n` followed by `original`, byte for byte.
#[must_use]
pub fn prepended(line: &str, original: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 1 + original.len());
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(original);
    out
}

/// Prepend `line` to the file at `path`.
pub fn prepend_line(path: &Path, line: &str) -> Result<()> {
    let target = fs::canonicalize(path).map_err(|e| GuardError::script_io(path, e))?;
    let original = fs::read(&target).map_err(|e| GuardError::script_io(path, e))?;
    let permissions = fs::metadata(&target)
        .map_err(|e| GuardError::script_io(path, e))?
        .permissions();

    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| GuardError::io(dir, e))?;

    tmp.write_all(&prepended(line, &original))
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| GuardError::io(tmp.path(), e))?;
    fs::set_permissions(tmp.path(), permissions).map_err(|e| GuardError::io(tmp.path(), e))?;

    // Raced by a delete: don't resurrect the script.
    if !target.exists() {
        return Err(GuardError::ScriptVanished {
            path: path.to_path_buf(),
        });
    }

    tmp.persist(&target)
        .map_err(|e| GuardError::io(&target, e.error))?;
    Ok(())
}
