//! Daemon subsystem: watch loop, directory watching, signal handling, and
//! multi-channel notifications.

#[cfg(feature = "daemon")]
pub mod loop_main;
pub mod notifications;
#[cfg(feature = "daemon")]
pub mod signals;
pub mod watcher;
