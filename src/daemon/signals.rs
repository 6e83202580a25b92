//! SIGINT/SIGTERM handling.
//!
//! `signal-hook` flips an `AtomicBool`; the watch loop polls it between
//! batches instead of blocking on signals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shutdown flag shared between the OS signal hooks and the watch loop.
#[derive(Debug, Clone, Default)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Handler with SIGINT and SIGTERM hooked up.
    ///
    /// Registration failures are reported on stderr and otherwise ignored;
    /// the default disposition (terminate) still applies then.
    #[must_use]
    pub fn install() -> Self {
        let handler = Self::unregistered();
        for (signal, name) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&handler.shutdown_flag)) {
                eprintln!("[BG-SIGNAL] failed to register {name}: {e}");
            }
        }
        handler
    }

    /// Handler not wired to any OS signal. Shutdown only via [`Self::request_shutdown`].
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether SIGINT/SIGTERM arrived or shutdown was requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Set the flag as if a signal had arrived.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}
