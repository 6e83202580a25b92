//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use bash_guard::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{GuardError, Result};

// Guard
pub use crate::guard::actions::{ActionExecutor, ActionReport, Mutation, Pacer};
pub use crate::guard::pipeline::{Disposition, Pipeline, PipelineStats};
pub use crate::guard::policy::{Thresholds, Verdict, classify};
pub use crate::guard::script::{ActionScript, Step};

// Sinks
pub use crate::daemon::notifications::{NotificationManager, Notifier, RecordingNotifier};
pub use crate::platform::trash::{Discard, TrashCan};

// Watching
pub use crate::daemon::watcher::{ChangeFeed, DirectoryWatcher, EventSink, FileEvent, NotifyFeed};
