//! Per-event pipeline: classify → measure → decide → act.
//!
//! [`Pipeline::handle`] is the only entry point the watch loop uses. It never
//! returns an error: a failure on one file is logged and counted, and the
//! loop moves on to the next event.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{GuardError, Result};
use crate::guard::actions::{ActionExecutor, ActionReport, Mutation};
use crate::guard::length::line_count;
use crate::guard::policy::{Thresholds, Verdict};
use crate::guard::shebang::is_shell_script;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// What the pipeline did with one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not a regular file (directory, vanished before we looked).
    NotAFile,
    /// First line is not a shell shebang.
    NotShell,
    /// Classified and acted upon (`Ignore` included).
    Acted { lines: u64, report: ActionReport },
}

/// Running totals, shared with the watch loop for the shutdown summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub events: u64,
    pub not_shell: u64,
    pub ignored: u64,
    pub snarky: u64,
    pub passive: u64,
    pub justice: u64,
    pub failures: u64,
}

impl PipelineStats {
    fn record_verdict(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Ignore => self.ignored += 1,
            Verdict::Snarky => self.snarky += 1,
            Verdict::Passive => self.passive += 1,
            Verdict::Justice => self.justice += 1,
        }
    }
}

/// The classify-measure-decide-act chain for one watched tree.
pub struct Pipeline {
    thresholds: Thresholds,
    executor: ActionExecutor,
    logger: ActivityLoggerHandle,
    verbose: bool,
    stats: Arc<Mutex<PipelineStats>>,
}

impl Pipeline {
    pub fn new(thresholds: Thresholds, executor: ActionExecutor, logger: ActivityLoggerHandle) -> Self {
        Self {
            thresholds,
            executor,
            logger,
            verbose: false,
            stats: Arc::new(Mutex::new(PipelineStats::default())),
        }
    }

    /// Echo per-event failures to stderr.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Shared view of the running totals.
    #[must_use]
    pub fn stats(&self) -> Arc<Mutex<PipelineStats>> {
        Arc::clone(&self.stats)
    }

    /// Run the pipeline for `path`, propagating failures.
    pub fn process(&self, path: &Path) -> Result<Disposition> {
        self.run(path).map_err(|(_, err)| err)
    }

    /// Run the pipeline for `path`, absorbing any failure.
    pub fn handle(&self, path: &Path) -> Option<Disposition> {
        self.stats.lock().events += 1;
        match self.run(path) {
            Ok(disposition) => {
                self.record(path, &disposition);
                Some(disposition)
            }
            Err((verdict, err)) => {
                self.record_failure(path, verdict, &err);
                None
            }
        }
    }

    /// Failures carry the verdict they interrupted, if classification got that far.
    fn run(&self, path: &Path) -> std::result::Result<Disposition, (Option<Verdict>, GuardError)> {
        if !path.is_file() {
            return Ok(Disposition::NotAFile);
        }
        if !is_shell_script(path).map_err(|err| (None, err))? {
            return Ok(Disposition::NotShell);
        }

        let lines = line_count(path).map_err(|err| (None, err))?;
        let verdict = self.thresholds.classify(lines);
        self.logger.send(ActivityEvent::ScriptClassified {
            path: path.display().to_string(),
            lines,
            verdict: verdict.to_string(),
        });

        let report = self
            .executor
            .execute(verdict, path)
            .map_err(|err| (Some(verdict), err))?;
        Ok(Disposition::Acted { lines, report })
    }

    fn record(&self, path: &Path, disposition: &Disposition) {
        let shown = path.display().to_string();
        match disposition {
            Disposition::NotAFile => {}
            Disposition::NotShell => {
                self.stats.lock().not_shell += 1;
                self.logger.send(ActivityEvent::EventSkipped {
                    path: shown,
                    reason: "not a shell script".to_string(),
                });
            }
            Disposition::Acted { report, .. } => {
                self.stats.lock().record_verdict(report.verdict);
                let duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX);
                match &report.mutation {
                    Mutation::Untouched => {}
                    Mutation::Rewritten => self.logger.send(ActivityEvent::ScriptRewritten {
                        path: shown,
                        duration_ms,
                    }),
                    Mutation::Discarded { trash_path } => {
                        self.logger.send(ActivityEvent::ScriptDiscarded {
                            path: shown,
                            trash_path: trash_path.display().to_string(),
                            duration_ms,
                        });
                    }
                }
            }
        }
    }

    fn record_failure(&self, path: &Path, verdict: Option<Verdict>, err: &GuardError) {
        self.stats.lock().failures += 1;
        if self.verbose {
            eprintln!("[BG-PIPELINE] {}: {err}", path.display());
        }
        self.logger.send(ActivityEvent::ActionFailed {
            path: path.display().to_string(),
            verdict: verdict.map(|v| v.to_string()),
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        });
    }
}
