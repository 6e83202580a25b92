//! Configuration system: TOML file + env var overrides + CLI flags + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};
use crate::core::paths::resolve_absolute_path;
use crate::daemon::notifications::NotificationConfig;
use crate::guard::policy::Thresholds;

/// Ignore patterns every watch starts with.
///
/// IDE metadata, git internals, editor swap/backup files, and the temp files
/// our own rewrite creates next to a script.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"\.idea",
    r"(^|/)\.git(/|$)",
    r"\.sw[a-p]$",
    r"~$",
    r"(^|/)4913$",
    r"(^|/)\.bash-guard-[^/]*\.tmp$",
];

/// Full bash-guard configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub watch: WatchConfig,
    pub pacing: PacingConfig,
    pub notifications: NotificationConfig,
    pub paths: PathsConfig,
}

/// What to watch and how to filter it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory watched recursively.
    pub root: PathBuf,
    /// Regexes matched against the root-relative path; matches are dropped.
    pub ignore_patterns: Vec<String>,
    /// Coalescing window for raw change events.
    pub debounce_ms: u64,
    /// Capacity of the raw-event and batch channels.
    pub channel_capacity: usize,
}

/// Human pacing between messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    pub message_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
    /// Where activity goes when `jsonl_log` cannot be written.
    pub jsonl_fallback: Option<PathBuf>,
    /// Explicit trash directory; `None` means the platform trash.
    pub trash_dir: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            debounce_ms: 100,
            channel_capacity: 1024,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            message_delay_ms: 2_000,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[BG-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("bash-guard").join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("bash-guard")
                .join("activity.jsonl"),
            jsonl_fallback: None,
            trash_dir: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    /// Validation is left to the caller so CLI flags can be layered on top first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|e| GuardError::io(&path_buf, e))?;
            toml::from_str::<Self>(&raw)?
        } else if path.is_some() {
            return Err(GuardError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        Ok(cfg)
    }

    /// Apply `BASH_GUARD_*` overrides read through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        set_env_u64(&mut lookup, "BASH_GUARD_SNARK", &mut self.thresholds.snark)?;
        set_env_u64(&mut lookup, "BASH_GUARD_PASSIVE", &mut self.thresholds.passive)?;
        set_env_u64(&mut lookup, "BASH_GUARD_JUST", &mut self.thresholds.just)?;
        set_env_u64(
            &mut lookup,
            "BASH_GUARD_DELAY_MS",
            &mut self.pacing.message_delay_ms,
        )?;
        set_env_u64(
            &mut lookup,
            "BASH_GUARD_DEBOUNCE_MS",
            &mut self.watch.debounce_ms,
        )?;
        set_env_bool(
            &mut lookup,
            "BASH_GUARD_DESKTOP",
            &mut self.notifications.desktop.enabled,
        )?;

        if let Some(raw) = lookup("BASH_GUARD_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("BASH_GUARD_JSONL_FALLBACK") {
            self.paths.jsonl_fallback = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("BASH_GUARD_TRASH_DIR") {
            self.paths.trash_dir = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    /// Check every setting that doesn't depend on the filesystem.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.watch.channel_capacity == 0 {
            return Err(GuardError::InvalidConfig {
                details: "watch.channel_capacity must be >= 1".to_string(),
            });
        }

        for pattern in &self.watch.ignore_patterns {
            Regex::new(pattern).map_err(|e| GuardError::InvalidPattern {
                pattern: pattern.clone(),
                details: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Resolve `watch.root` to an absolute path and require a directory there.
    pub fn validate_root(&mut self) -> Result<()> {
        let resolved = resolve_absolute_path(&self.watch.root);
        if !resolved.is_dir() {
            return Err(GuardError::InvalidConfig {
                details: format!("watch.root {} is not a directory", self.watch.root.display()),
            });
        }
        self.watch.root = resolved;
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<u64>().map_err(|error| GuardError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse::<bool>().map_err(|error| GuardError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}
