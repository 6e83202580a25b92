//! Shell-script detection from the first line of a file.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::{GuardError, Result};

/// Longest first line we are willing to buffer.
const MAX_HEADER_BYTES: u64 = 1024;

static SHELL_SHEBANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#!.*sh").expect("shebang regex is valid"));

/// Whether a header line names a shell interpreter (`#!/bin/sh`,
/// `#!/usr/bin/env bash`, `#! /bin/zsh -e`, ...).
#[must_use]
pub fn is_shell_shebang(line: &str) -> bool {
    SHELL_SHEBANG.is_match(line)
}

/// Read the first line of `path`, up to [`MAX_HEADER_BYTES`].
///
/// An empty file has no first line and yields [`GuardError::EmptyScript`].
pub fn read_first_line(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| GuardError::script_io(path, e))?;
    let mut reader = BufReader::new(file.take(MAX_HEADER_BYTES));
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .map_err(|e| GuardError::script_io(path, e))?;
    if read == 0 {
        return Err(GuardError::EmptyScript {
            path: path.to_path_buf(),
        });
    }
    Ok(String::from_utf8_lossy(&line).trim_end().to_string())
}

/// Whether the file at `path` starts with a shell shebang.
pub fn is_shell_script(path: &Path) -> Result<bool> {
    read_first_line(path).map(|line| is_shell_shebang(&line))
}
