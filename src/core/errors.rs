//! BG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, GuardError>;

/// Top-level error type for bash-guard.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("[BG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BG-1004] invalid ignore pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[BG-2001] no first line to inspect in {path}")]
    EmptyScript { path: PathBuf },

    #[error("[BG-2002] script vanished before action completed: {path}")]
    ScriptVanished { path: PathBuf },

    #[error("[BG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BG-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BG-3002] trash failure for {path}: {details}")]
    Trash { path: PathBuf, details: String },

    #[error("[BG-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[BG-3004] watcher failure for {path}: {details}")]
    Watch { path: PathBuf, details: String },

    #[error("[BG-3005] action interrupted by shutdown for {path}")]
    Interrupted { path: PathBuf },

    #[error("[BG-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl GuardError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BG-1001",
            Self::MissingConfig { .. } => "BG-1002",
            Self::ConfigParse { .. } => "BG-1003",
            Self::InvalidPattern { .. } => "BG-1004",
            Self::EmptyScript { .. } => "BG-2001",
            Self::ScriptVanished { .. } => "BG-2002",
            Self::Serialization { .. } => "BG-2101",
            Self::Io { .. } => "BG-3001",
            Self::Trash { .. } => "BG-3002",
            Self::ChannelClosed { .. } => "BG-3003",
            Self::Watch { .. } => "BG-3004",
            Self::Interrupted { .. } => "BG-3005",
            Self::Runtime { .. } => "BG-3900",
        }
    }

    /// Whether the failure belongs to startup configuration (fatal) rather
    /// than a single watched file (recoverable).
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ChannelClosed { .. } | Self::Watch { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Map an IO error on a watched script, folding `NotFound` into
    /// [`GuardError::ScriptVanished`].
    #[must_use]
    pub fn script_io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::ScriptVanished {
                path: path.as_ref().to_path_buf(),
            }
        } else {
            Self::io(path, source)
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GuardError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<notify::Error> for GuardError {
    fn from(value: notify::Error) -> Self {
        Self::Watch {
            path: value.paths.first().cloned().unwrap_or_default(),
            details: value.to_string(),
        }
    }
}
