//! Action executor: runs a verdict's script against one file.
//!
//! Steps run strictly in order on the calling thread. Each message is
//! followed by a pause long enough to read it; the pause is cut short when
//! the process is shutting down. Before the mutation an interrupt abandons
//! the script so nothing is rewritten or trashed. After it, the script just
//! ends early and the mutation is still reported.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::core::errors::{GuardError, Result};
use crate::daemon::notifications::Notifier;
use crate::guard::policy::Verdict;
use crate::guard::rewrite;
use crate::guard::script::{ActionScript, NOTIFICATION_TITLE, REWRITE_DIRECTIVE, Step};
use crate::platform::trash::Discard;

// ──────────────────── pacing ────────────────────

/// Sleeps between messages, waking early on cancellation.
///
/// Cancellation is signalled by dropping every `Sender` of the `cancel`
/// channel (or sending on it).
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
    cancel: Receiver<()>,
}

impl Pacer {
    #[must_use]
    pub const fn new(delay: Duration, cancel: Receiver<()>) -> Self {
        Self { delay, cancel }
    }

    /// No pause and no cancellation.
    #[must_use]
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, crossbeam_channel::never())
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out one pause. Returns `false` if cancelled.
    pub fn pause(&self) -> bool {
        match self.cancel.recv_timeout(self.delay) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

// ──────────────────── reports ────────────────────

/// What happened to the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Untouched,
    Rewritten,
    Discarded { trash_path: PathBuf },
}

/// Summary of one executed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub verdict: Verdict,
    pub messages_sent: usize,
    pub mutation: Mutation,
    pub duration: Duration,
}

// ──────────────────── executor ────────────────────

/// Performs the side effects bound to a verdict.
pub struct ActionExecutor {
    notifier: Arc<dyn Notifier>,
    discard: Arc<dyn Discard>,
    pacer: Pacer,
}

impl ActionExecutor {
    pub fn new(notifier: Arc<dyn Notifier>, discard: Arc<dyn Discard>, pacer: Pacer) -> Self {
        Self {
            notifier,
            discard,
            pacer,
        }
    }

    /// Run the script for `verdict` against `path`.
    ///
    /// On a failed mutation the confirmation message is not sent and the
    /// error is returned; messages already shown stay shown.
    pub fn execute(&self, verdict: Verdict, path: &Path) -> Result<ActionReport> {
        let started = Instant::now();
        let script = ActionScript::for_verdict(verdict);
        let mut messages_sent = 0;
        let mut mutation = Mutation::Untouched;

        for step in script.steps() {
            match *step {
                Step::Notify(message) => {
                    self.notifier.notify(message, NOTIFICATION_TITLE);
                    messages_sent += 1;
                    if !self.pacer.pause() {
                        if mutation == Mutation::Untouched {
                            return Err(GuardError::Interrupted {
                                path: path.to_path_buf(),
                            });
                        }
                        break;
                    }
                }
                Step::Rewrite => {
                    rewrite::prepend_line(path, REWRITE_DIRECTIVE)?;
                    mutation = Mutation::Rewritten;
                }
                Step::Discard => {
                    let trash_path = self.discard.discard(path)?;
                    mutation = Mutation::Discarded { trash_path };
                }
            }
        }

        Ok(ActionReport {
            verdict,
            messages_sent,
            mutation,
            duration: started.elapsed(),
        })
    }
}
