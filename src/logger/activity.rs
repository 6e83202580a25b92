//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Everything else sends
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send`, so
//! the pipeline never waits on disk.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{GuardError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 256;

/// Events recorded in the activity log.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    WatchStarted {
        version: String,
        root: String,
        thresholds: String,
    },
    WatchStopped {
        reason: String,
        uptime_secs: u64,
        events_handled: u64,
    },
    ScriptClassified {
        path: String,
        lines: u64,
        verdict: String,
    },
    ScriptRewritten {
        path: String,
        duration_ms: u64,
    },
    ScriptDiscarded {
        path: String,
        trash_path: String,
        duration_ms: u64,
    },
    ActionFailed {
        path: String,
        verdict: Option<String>,
        error_code: String,
        error_message: String,
    },
    EventSkipped {
        path: String,
        reason: String,
    },
    /// File events the watcher lost to a full channel since the last report.
    EventsDropped {
        count: u64,
    },
    /// The watch cannot continue.
    Error {
        code: String,
        message: String,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

/// Cheaply cloneable handle for sending log events.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Never blocks; drops on back-pressure.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped because the channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and stop. Blocks until the sentinel is queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose events go nowhere.
    #[must_use]
    pub fn detached() -> Self {
        let (tx, _rx) = bounded(0);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle plus the raw receiver, for inspecting events in tests.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

/// Spawn the logger thread writing to `config`.
pub fn spawn_logger(config: JsonlConfig) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(CHANNEL_CAPACITY);
    let dropped = Arc::clone(&handle.dropped_events);

    let join = thread::Builder::new()
        .name("bg-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped))
        .map_err(|e| GuardError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if event == ActivityEvent::Shutdown {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

/// Convert an event into its JSONL representation.
#[must_use]
pub fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::WatchStarted {
            version,
            root,
            thresholds,
        } => {
            let mut e = LogEntry::new(EventType::WatchStart, Severity::Info);
            e.path = Some(root.clone());
            e.details = Some(format!("version={version} thresholds={thresholds}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::WatchStopped {
            reason,
            uptime_secs,
            events_handled,
        } => {
            let mut e = LogEntry::new(EventType::WatchStop, Severity::Info);
            e.details = Some(format!(
                "reason={reason} uptime={uptime_secs}s events={events_handled}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScriptClassified {
            path,
            lines,
            verdict,
        } => {
            let mut e = LogEntry::new(EventType::ScriptClassified, Severity::Info);
            e.path = Some(path.clone());
            e.lines = Some(*lines);
            e.verdict = Some(verdict.clone());
            e
        }
        ActivityEvent::ScriptRewritten { path, duration_ms } => {
            let mut e = LogEntry::new(EventType::ScriptRewritten, Severity::Warning);
            e.path = Some(path.clone());
            e.verdict = Some("passive".to_string());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ScriptDiscarded {
            path,
            trash_path,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::ScriptDiscarded, Severity::Warning);
            e.path = Some(path.clone());
            e.verdict = Some("justice".to_string());
            e.trash_path = Some(trash_path.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::ActionFailed {
            path,
            verdict,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::ActionFailed, Severity::Warning);
            e.path = Some(path.clone());
            e.verdict.clone_from(verdict);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::EventSkipped { path, reason } => {
            let mut e = LogEntry::new(EventType::EventSkipped, Severity::Info);
            e.path = Some(path.clone());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::EventsDropped { count } => {
            let mut e = LogEntry::new(EventType::EventsDropped, Severity::Warning);
            e.details = Some(format!("{count} file events dropped: watcher channel full"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::WatchStop, Severity::Info),
    }
}
