#![forbid(unsafe_code)]

//! bash-guard: watches a directory tree for shell scripts and reacts to
//! their length.
//!
//! Every created or modified file whose first line is a shell shebang is
//! measured in newlines and classified against three ordered thresholds:
//! 1. **Snarky**: a handful of notifications
//! 2. **Passive**: notifications, then the script is "fixed" with a ruby shebang
//! 3. **Justice**: notifications, then the script goes to the trash
//!
//! # Library usage
//!
//! ```rust,no_run
//! use bash_guard::prelude::*;
//!
//! let thresholds = Thresholds::new(5, 25, 50)?;
//! assert_eq!(thresholds.classify(30), Verdict::Passive);
//! # Ok::<(), GuardError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod guard;
pub mod logger;
pub mod platform;
