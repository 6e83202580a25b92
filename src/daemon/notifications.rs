//! Notification sink: desktop, journal, and file channels.
//!
//! Every channel is fire-and-forget. A failing `notify-send` or an unwritable
//! notification file is swallowed; the action script keeps going.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Something that can put a message in front of the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, title: &str);
}

// ──────────────────── configuration ────────────────────

/// Top-level notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Master switch for all notifications.
    pub enabled: bool,
    /// Which channel names to activate.
    pub channels: Vec<String>,
    pub desktop: DesktopConfig,
    pub file: FileConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: vec!["desktop".to_string()],
            desktop: DesktopConfig::default(),
            file: FileConfig::default(),
        }
    }
}

/// Desktop notification settings (notify-send on Linux, osascript on macOS).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopConfig {
    pub enabled: bool,
    /// Passed to `notify-send --app-name`.
    pub app_name: String,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "bash-guard".to_string(),
        }
    }
}

/// File notification settings (append-only JSONL).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub path: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        Self {
            path: home
                .join(".local")
                .join("share")
                .join("bash-guard")
                .join("notifications.jsonl"),
        }
    }
}

// ──────────────────── channels ────────────────────

trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, message: &str, title: &str);
}

// ──── Desktop (notify-send / osascript) ────

struct DesktopChannel {
    app_name: String,
}

impl Channel for DesktopChannel {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn send(&self, message: &str, title: &str) {
        #[cfg(target_os = "macos")]
        {
            let _ = &self.app_name;
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_escape(message),
                applescript_escape(title)
            );
            let _ = Command::new("osascript")
                .arg("-e")
                .arg(&script)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }

        #[cfg(not(target_os = "macos"))]
        {
            // Waited on so repeated notifications don't pile up zombies.
            let _ = Command::new("notify-send")
                .arg(format!("--app-name={}", self.app_name))
                .arg(title)
                .arg(message)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

#[cfg(target_os = "macos")]
fn applescript_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

// ──── Journal (stderr) ────

struct JournalChannel;

impl Channel for JournalChannel {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn send(&self, message: &str, title: &str) {
        eprintln!("[BG-NOTIFY] {title}: {message}");
    }
}

// ──── File (append-only JSONL) ────

#[derive(Debug, Serialize)]
struct NotificationRecord<'a> {
    ts: String,
    title: &'a str,
    message: &'a str,
}

struct FileChannel {
    path: PathBuf,
}

impl Channel for FileChannel {
    fn name(&self) -> &'static str {
        "file"
    }

    fn send(&self, message: &str, title: &str) {
        let record = NotificationRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            title,
            message,
        };
        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };

        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        let file = {
            let mut opts = OpenOptions::new();
            opts.create(true).append(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt as _;
                opts.mode(0o600);
            }
            opts.open(&self.path)
        };

        if let Ok(mut f) = file {
            let _ = writeln!(f, "{json}");
        }
    }
}

// ──────────────────── notification manager ────────────────────

/// Fans each message out to every enabled channel.
pub struct NotificationManager {
    channels: Vec<Box<dyn Channel>>,
    enabled: bool,
    last_send: Mutex<Option<Instant>>,
}

impl NotificationManager {
    /// Build a manager from configuration.
    #[must_use]
    pub fn from_config(config: &NotificationConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }

        let mut channels: Vec<Box<dyn Channel>> = Vec::new();
        for channel_name in &config.channels {
            match channel_name.as_str() {
                "desktop" if config.desktop.enabled => {
                    channels.push(Box::new(DesktopChannel {
                        app_name: config.desktop.app_name.clone(),
                    }));
                }
                "journal" => channels.push(Box::new(JournalChannel)),
                "file" => channels.push(Box::new(FileChannel {
                    path: config.file.path.clone(),
                })),
                _ => {}
            }
        }

        Self {
            channels,
            enabled: true,
            last_send: Mutex::new(None),
        }
    }

    /// Create a disabled (no-op) manager.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            enabled: false,
            last_send: Mutex::new(None),
        }
    }

    /// Whether the manager is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Names of active channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// When the last message went out, if any.
    #[must_use]
    pub fn last_send(&self) -> Option<Instant> {
        *self.last_send.lock()
    }
}

impl Notifier for NotificationManager {
    fn notify(&self, message: &str, title: &str) {
        if !self.enabled {
            return;
        }
        *self.last_send.lock() = Some(Instant::now());
        for channel in &self.channels {
            channel.send(message, title);
        }
    }
}

// ──────────────────── in-memory recorder ────────────────────

/// One delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

/// Notifier that keeps every message in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.message.clone()).collect()
    }

    /// Full records delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, title: &str) {
        self.sent.lock().push(Notification {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}
