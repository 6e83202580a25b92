//! Recursive directory watching.
//!
//! A [`ChangeFeed`] turns OS notifications into [`FileEvent`]s and hands them
//! to an [`EventSink`], which drops ignored paths and directories before they
//! reach the bounded channel. [`DirectoryWatcher`] drains that channel into
//! debounced batches: duplicates collapsed, first-seen order kept.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::RegexSet;

use crate::core::config::WatchConfig;
use crate::core::errors::{GuardError, Result};
use crate::core::paths::relative_display;

// ──────────────────── events ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}

/// One observed change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl FileEvent {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Created/modified events carried by a raw `notify` event.
///
/// Removals, accesses, metadata-only changes and the source side of a rename
/// produce nothing.
#[must_use]
pub fn file_events(event: &Event) -> Vec<FileEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Metadata(_) | ModifyKind::Name(RenameMode::From)) => {
            return Vec::new();
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // [from, to]: only the destination exists afterwards.
            return event
                .paths
                .get(1)
                .map(|to| vec![FileEvent::new(to.clone(), ChangeKind::Modified)])
                .unwrap_or_default();
        }
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Any | EventKind::Access(_) | EventKind::Remove(_) | EventKind::Other => {
            return Vec::new();
        }
    };
    event
        .paths
        .iter()
        .map(|p| FileEvent::new(p.clone(), kind))
        .collect()
}

// ──────────────────── feeds ────────────────────

/// Write end handed to a [`ChangeFeed`].
///
/// Ignored paths and directories are dropped here, on the backend's thread,
/// so churn under `.git/` and friends never takes space in the bounded
/// channel. A full channel drops the event and counts it.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<FileEvent>,
    ignore: IgnoreSet,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    #[must_use]
    pub fn new(tx: Sender<FileEvent>, ignore: IgnoreSet) -> Self {
        Self {
            tx,
            ignore,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue `change` unless it is ignored or names a directory. Never blocks.
    ///
    /// Returns whether the event was queued.
    pub fn forward(&self, change: FileEvent) -> bool {
        if self.ignore.is_ignored(&change.path) || change.path.is_dir() {
            return false;
        }
        match self.tx.try_send(change) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Events lost because the channel was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Source of change events for a directory tree.
pub trait ChangeFeed: Send {
    /// Start delivering events under `root` (recursively) into `sink`.
    fn subscribe(&mut self, root: &Path, sink: EventSink) -> Result<()>;

    /// Stop delivering events. Idempotent.
    fn unsubscribe(&mut self);
}

/// [`ChangeFeed`] backed by the platform's `notify` watcher.
#[derive(Default)]
pub struct NotifyFeed {
    watcher: Option<RecommendedWatcher>,
}

impl NotifyFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeFeed for NotifyFeed {
    fn subscribe(&mut self, root: &Path, sink: EventSink) -> Result<()> {
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in file_events(&event) {
                        sink.forward(change);
                    }
                }
                Err(e) => eprintln!("[BG-WATCH] backend error: {e}"),
            },
            notify::Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.watcher = None;
    }
}

// ──────────────────── ignore set ────────────────────

/// Compiled ignore patterns, matched against root-relative paths.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    root: PathBuf,
    set: RegexSet,
}

impl IgnoreSet {
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self> {
        let set = RegexSet::new(patterns).map_err(|e| GuardError::InvalidPattern {
            pattern: patterns.join(", "),
            details: e.to_string(),
        })?;
        Ok(Self {
            root: root.into(),
            set,
        })
    }

    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.set.is_match(&relative_display(&self.root, path))
    }
}

// ──────────────────── watcher ────────────────────

/// Debounces a [`ChangeFeed`] into deduplicated batches of paths.
pub struct DirectoryWatcher<F: ChangeFeed> {
    root: PathBuf,
    feed: F,
    debounce: Duration,
    sink: EventSink,
    events: Receiver<FileEvent>,
    subscribed: bool,
}

impl<F: ChangeFeed> DirectoryWatcher<F> {
    /// Watcher over `config.root`, which should already be absolute.
    pub fn new(feed: F, config: &WatchConfig) -> Result<Self> {
        let ignore = IgnoreSet::new(&config.root, &config.ignore_patterns)?;
        let (tx, events) = bounded(config.channel_capacity.max(1));
        Ok(Self {
            root: config.root.clone(),
            feed,
            debounce: Duration::from_millis(config.debounce_ms),
            sink: EventSink::new(tx, ignore),
            events,
            subscribed: false,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Events the feed could not queue because the channel was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.sink.dropped_events()
    }

    pub fn start(&mut self) -> Result<()> {
        if !self.subscribed {
            self.feed.subscribe(&self.root, self.sink.clone())?;
            self.subscribed = true;
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.subscribed {
            self.feed.unsubscribe();
            self.subscribed = false;
        }
    }

    /// Wait up to `timeout` for a change, then gather whatever else arrives
    /// within the debounce window.
    ///
    /// Returns an empty batch on timeout. Each path appears once, at its
    /// first position.
    pub fn next_batch(&self, timeout: Duration) -> Vec<FileEvent> {
        let first = match self.events.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return Vec::new(),
        };

        let mut raw = vec![first];
        let deadline = Instant::now() + self.debounce;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => raw.push(event),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut seen = HashSet::new();
        raw.into_iter()
            .filter(|event| seen.insert(event.path.clone()))
            .collect()
    }
}

impl<F: ChangeFeed> Drop for DirectoryWatcher<F> {
    fn drop(&mut self) {
        self.stop();
    }
}
