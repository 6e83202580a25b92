//! Newline counting: the crude size metric the policy classifies on.

use std::fs;
use std::path::Path;

use crate::core::errors::{GuardError, Result};

/// Number of `\n` bytes in `bytes`.
#[must_use]
pub fn count_newlines(bytes: &[u8]) -> u64 {
    memchr::memchr_iter(b'\n', bytes).count() as u64
}

/// Newline count of the file currently at `path`.
pub fn line_count(path: &Path) -> Result<u64> {
    let bytes = fs::read(path).map_err(|e| GuardError::script_io(path, e))?;
    Ok(count_newlines(&bytes))
}
