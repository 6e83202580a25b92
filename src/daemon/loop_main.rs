//! Watch loop: thread orchestration and shutdown.
//!
//! Three threads besides any the OS watcher backend spawns:
//! - **Main thread**: drains debounced batches from the [`DirectoryWatcher`]
//!   and polls the shutdown flag between them.
//! - **Pipeline worker** (`bg-pipeline`): runs each path through the
//!   [`Pipeline`] in arrival order. Human-paced scripts hold up later events;
//!   that is the price of never reordering events for one path.
//! - **Logger thread** (`bg-logger`): writes the JSONL activity log.
//!
//! On shutdown the cancel channel is closed first, so a pause in progress
//! wakes at once. A script interrupted before its mutation is abandoned with
//! the file untouched; one interrupted after it just skips the rest.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};

use crate::core::config::Config;
use crate::core::errors::{GuardError, Result};
use crate::daemon::notifications::{NotificationManager, Notifier};
use crate::daemon::signals::SignalHandler;
use crate::daemon::watcher::{ChangeFeed, DirectoryWatcher, FileEvent, NotifyFeed};
use crate::guard::actions::{ActionExecutor, Pacer};
use crate::guard::pipeline::{Pipeline, PipelineStats};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use crate::logger::jsonl::JsonlConfig;
use crate::platform::trash::TrashCan;

/// Main thread → pipeline worker. Small: the watcher keeps coalescing while
/// the worker is busy.
const BATCH_CHANNEL_CAP: usize = 16;

/// How long the main thread waits for a change before re-checking signals.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Stderr behaviour of a watch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchArgs {
    /// Per-event diagnostics and a shutdown summary.
    pub verbose: bool,
    /// No startup line.
    pub quiet: bool,
}

/// One watched tree, from startup to shutdown.
pub struct GuardDaemon<F: ChangeFeed> {
    config: Config,
    args: WatchArgs,
    watcher: DirectoryWatcher<F>,
    signal_handler: SignalHandler,
    notifier: Arc<dyn Notifier>,
    logger_handle: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    start_time: Instant,
}

impl GuardDaemon<NotifyFeed> {
    /// Production wiring: `notify` backend, OS signals, configured notification channels.
    pub fn init(config: Config, args: WatchArgs) -> Result<Self> {
        let notifier = Arc::new(NotificationManager::from_config(&config.notifications));
        Self::with_parts(config, args, NotifyFeed::new(), SignalHandler::install(), notifier)
    }
}

impl<F: ChangeFeed> GuardDaemon<F> {
    /// Build a daemon from explicit collaborators. `config` must already be validated.
    pub fn with_parts(
        config: Config,
        args: WatchArgs,
        feed: F,
        signal_handler: SignalHandler,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let watcher = DirectoryWatcher::new(feed, &config.watch)?;
        let (logger_handle, logger_join) = spawn_logger(
            JsonlConfig::at(&config.paths.jsonl_log).with_fallback(config.paths.jsonl_fallback.clone()),
        )?;

        Ok(Self {
            config,
            args,
            watcher,
            signal_handler,
            notifier,
            logger_handle,
            logger_join: Some(logger_join),
            start_time: Instant::now(),
        })
    }

    /// Shared shutdown flag; setting it ends [`Self::run`].
    #[must_use]
    pub fn signal_handler(&self) -> SignalHandler {
        self.signal_handler.clone()
    }

    /// Watch until shutdown is requested. Returns the final totals.
    pub fn run(&mut self) -> Result<PipelineStats> {
        let root = self.watcher.root().display().to_string();
        let thresholds = self.config.thresholds;
        self.logger_handle.send(ActivityEvent::WatchStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            root: root.clone(),
            thresholds: thresholds.to_string(),
        });
        if !self.args.quiet {
            eprintln!("[BG-WATCH] watching {root} ({thresholds})");
        }

        // Dropping `cancel_tx` wakes any pacing pause in the worker.
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let (batch_tx, batch_rx) = bounded::<Vec<FileEvent>>(BATCH_CHANNEL_CAP);

        let pipeline = self.build_pipeline(cancel_rx);
        let stats = pipeline.stats();
        let worker = self.spawn_pipeline_thread(pipeline, batch_rx)?;

        if let Err(err) = self.watcher.start() {
            drop(batch_tx);
            drop(cancel_tx);
            let _ = worker.join();
            self.stop_logger();
            return Err(err);
        }

        let outcome = self.watch_loop(&batch_tx, &worker);

        self.watcher.stop();
        drop(cancel_tx);
        drop(batch_tx);
        let worker_panicked = worker.join().is_err();

        let totals = stats.lock().clone();
        match (&outcome, worker_panicked) {
            (Err(err), _) => self.logger_handle.send(ActivityEvent::Error {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
            (Ok(()), true) => self.logger_handle.send(ActivityEvent::Error {
                code: "BG-3900".to_string(),
                message: "pipeline worker panicked".to_string(),
            }),
            (Ok(()), false) => {}
        }
        let reason = match (&outcome, worker_panicked) {
            (Err(err), _) => format!("error: {err}"),
            (Ok(()), true) => "pipeline worker panicked".to_string(),
            (Ok(()), false) => "signal".to_string(),
        };
        let uptime_secs = self.start_time.elapsed().as_secs();
        self.logger_handle.send(ActivityEvent::WatchStopped {
            reason,
            uptime_secs,
            events_handled: totals.events,
        });
        self.stop_logger();

        if self.args.verbose {
            eprintln!(
                "[BG-WATCH] stopped after {uptime_secs}s: events={} ignored={} snarky={} passive={} justice={} failures={}",
                totals.events,
                totals.ignored,
                totals.snarky,
                totals.passive,
                totals.justice,
                totals.failures,
            );
        }

        outcome.map(|()| totals)
    }

    fn watch_loop(&self, batch_tx: &Sender<Vec<FileEvent>>, worker: &thread::JoinHandle<()>) -> Result<()> {
        let mut dropped_reported = 0;
        loop {
            if self.signal_handler.should_shutdown() {
                return Ok(());
            }
            dropped_reported = self.report_dropped(dropped_reported);
            if worker.is_finished() {
                return Err(GuardError::ChannelClosed {
                    component: "pipeline worker",
                });
            }

            let batch = self.watcher.next_batch(POLL_INTERVAL);
            if batch.is_empty() {
                continue;
            }
            if self.args.verbose {
                for event in &batch {
                    eprintln!("[BG-WATCH] {:?} {}", event.kind, event.path.display());
                }
            }
            self.forward(batch_tx, batch)?;
        }
    }

    /// Log file events lost since `already_reported`. Returns the new total.
    fn report_dropped(&self, already_reported: u64) -> u64 {
        let dropped = self.watcher.dropped_events();
        if dropped > already_reported {
            let count = dropped - already_reported;
            self.logger_handle.send(ActivityEvent::EventsDropped { count });
            if self.args.verbose {
                eprintln!("[BG-WATCH] {count} file events dropped: watcher channel full");
            }
        }
        dropped
    }

    /// Hand a batch to the worker, giving up only on shutdown.
    fn forward(&self, batch_tx: &Sender<Vec<FileEvent>>, mut batch: Vec<FileEvent>) -> Result<()> {
        loop {
            match batch_tx.send_timeout(batch, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(pending)) => {
                    if self.signal_handler.should_shutdown() {
                        return Ok(());
                    }
                    batch = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(GuardError::ChannelClosed {
                        component: "pipeline worker",
                    });
                }
            }
        }
    }

    fn build_pipeline(&self, cancel: Receiver<()>) -> Pipeline {
        let pacer = Pacer::new(Duration::from_millis(self.config.pacing.message_delay_ms), cancel);
        let trash = Arc::new(TrashCan::from_override(self.config.paths.trash_dir.as_deref()));
        let executor = ActionExecutor::new(Arc::clone(&self.notifier), trash, pacer);
        Pipeline::new(self.config.thresholds, executor, self.logger_handle.clone())
            .verbose(self.args.verbose)
    }

    fn spawn_pipeline_thread(
        &self,
        pipeline: Pipeline,
        batch_rx: Receiver<Vec<FileEvent>>,
    ) -> Result<thread::JoinHandle<()>> {
        let signals = self.signal_handler.clone();
        thread::Builder::new()
            .name("bg-pipeline".to_string())
            .spawn(move || pipeline_thread_main(&pipeline, &batch_rx, &signals))
            .map_err(|source| GuardError::Runtime {
                details: format!("failed to spawn pipeline thread: {source}"),
            })
    }

    fn stop_logger(&mut self) {
        self.logger_handle.shutdown();
        if let Some(join) = self.logger_join.take() {
            let _ = join.join();
        }
    }
}

/// Pipeline worker: one path at a time, batches in arrival order.
fn pipeline_thread_main(pipeline: &Pipeline, batch_rx: &Receiver<Vec<FileEvent>>, signals: &SignalHandler) {
    while let Ok(batch) = batch_rx.recv() {
        for event in batch {
            if signals.should_shutdown() {
                return;
            }
            pipeline.handle(&event.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::notifications::RecordingNotifier;
    use crate::daemon::watcher::{ChangeKind, EventSink};
    use parking_lot::Mutex;
    use std::fs;
    use std::path::Path;

    #[derive(Default, Clone)]
    struct ManualFeed {
        sink: Arc<Mutex<Option<EventSink>>>,
    }

    impl ManualFeed {
        fn emit(&self, path: &Path) {
            if let Some(sink) = self.sink.lock().as_ref() {
                sink.forward(FileEvent::new(path, ChangeKind::Modified));
            }
        }

        fn dropped(&self) -> u64 {
            self.sink.lock().as_ref().map_or(0, EventSink::dropped_events)
        }

        fn is_subscribed(&self) -> bool {
            self.sink.lock().is_some()
        }
    }

    impl ChangeFeed for ManualFeed {
        fn subscribe(&mut self, _root: &Path, sink: EventSink) -> Result<()> {
            *self.sink.lock() = Some(sink);
            Ok(())
        }

        fn unsubscribe(&mut self) {
            *self.sink.lock() = None;
        }
    }

    struct Harness {
        work: tempfile::TempDir,
        state: tempfile::TempDir,
        feed: ManualFeed,
        notes: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        Harness {
            work: tempfile::tempdir().unwrap(),
            state: tempfile::tempdir().unwrap(),
            feed: ManualFeed::default(),
            notes: Arc::new(RecordingNotifier::new()),
        }
    }

    fn config(h: &Harness, delay_ms: u64) -> Config {
        let mut cfg = Config::default();
        cfg.watch.root = h.work.path().to_path_buf();
        cfg.watch.debounce_ms = 10;
        cfg.pacing.message_delay_ms = delay_ms;
        cfg.paths.jsonl_log = h.state.path().join("activity.jsonl");
        cfg.paths.trash_dir = Some(h.state.path().join("Trash"));
        cfg
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn quiet() -> WatchArgs {
        WatchArgs {
            verbose: false,
            quiet: true,
        }
    }

    #[test]
    fn oversized_script_is_trashed_and_logged() {
        let h = harness();
        let mut daemon = GuardDaemon::with_parts(
            config(&h, 0),
            quiet(),
            h.feed.clone(),
            SignalHandler::unregistered(),
            h.notes.clone(),
        )
        .unwrap();
        let signals = daemon.signal_handler();
        let running = thread::spawn(move || daemon.run());

        assert!(wait_for(|| h.feed.is_subscribed()));
        let script = h.work.path().join("huge.sh");
        fs::write(&script, format!("#!/bin/bash\n{}", "echo x\n".repeat(59))).unwrap();
        h.feed.emit(&script);

        assert!(wait_for(|| h.notes.messages().last().map(String::as_str) == Some("OPTIMIZED!")));
        signals.request_shutdown();
        let stats = running.join().unwrap().unwrap();

        assert!(!script.exists());
        assert_eq!(stats.justice, 1);
        assert!(!h.feed.is_subscribed());

        let log = fs::read_to_string(h.state.path().join("activity.jsonl")).unwrap();
        assert!(log.contains("\"watch_start\""));
        assert!(log.contains("\"script_discarded\""));
        assert!(log.contains("\"watch_stop\""));
    }

    #[test]
    fn overflowing_watcher_channel_is_logged_as_a_warning() {
        let h = harness();
        let mut cfg = config(&h, 60_000);
        cfg.watch.channel_capacity = 1;
        let mut daemon = GuardDaemon::with_parts(
            cfg,
            quiet(),
            h.feed.clone(),
            SignalHandler::unregistered(),
            h.notes.clone(),
        )
        .unwrap();
        let signals = daemon.signal_handler();
        let running = thread::spawn(move || daemon.run());

        assert!(wait_for(|| h.feed.is_subscribed()));
        // The first script keeps the worker in a long pause while the rest
        // pile up behind it.
        let first = h.work.path().join("big.sh");
        fs::write(&first, format!("#!/bin/sh\n{}", "echo x\n".repeat(29))).unwrap();
        h.feed.emit(&first);
        assert!(wait_for(|| !h.notes.sent().is_empty()));
        let mut i = 0;
        while h.feed.dropped() == 0 && i < 100_000 {
            h.feed.emit(&h.work.path().join(format!("s{i}.sh")));
            i += 1;
        }
        assert!(h.feed.dropped() > 0);

        let log_path = h.state.path().join("activity.jsonl");
        // Logged once the main loop comes back around; it flushes per line.
        let logged = wait_for(|| {
            fs::read_to_string(&log_path).is_ok_and(|log| log.contains("\"events_dropped\""))
        });
        signals.request_shutdown();
        running.join().unwrap().unwrap();
        assert!(logged, "no events_dropped entry");

        let log = fs::read_to_string(&log_path).unwrap();
        let entry: serde_json::Value = log
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .find(|e| e["event"] == "events_dropped")
            .unwrap();
        assert_eq!(entry["severity"], "warning");
    }

    #[test]
    fn shutdown_mid_script_leaves_file_untouched() {
        let h = harness();
        let mut daemon = GuardDaemon::with_parts(
            config(&h, 60_000),
            quiet(),
            h.feed.clone(),
            SignalHandler::unregistered(),
            h.notes.clone(),
        )
        .unwrap();
        let signals = daemon.signal_handler();
        let running = thread::spawn(move || daemon.run());

        assert!(wait_for(|| h.feed.is_subscribed()));
        let script = h.work.path().join("big.sh");
        let body = format!("#!/bin/sh\n{}", "echo x\n".repeat(29));
        fs::write(&script, &body).unwrap();
        h.feed.emit(&script);

        assert!(wait_for(|| !h.notes.sent().is_empty()));
        let started = Instant::now();
        signals.request_shutdown();
        let stats = running.join().unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(fs::read_to_string(&script).unwrap(), body);
        assert_eq!(h.notes.messages().len(), 1);
        assert_eq!(stats.failures, 1);
    }
}
