//! Command-line definition and dispatch.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use bash_guard::core::config::Config;
use bash_guard::core::errors::GuardError;
use bash_guard::daemon::loop_main::{GuardDaemon, WatchArgs};

/// Guards against bash.
///
/// Watches DIRECTORY for shell scripts and reacts as they grow: a few snarky
/// notifications, then a "fix" to a ruby shebang, then the trash.
#[derive(Debug, Parser)]
#[command(
    name = "bash-guard",
    author,
    version,
    about = "Guards against bash",
    override_usage = "bash-guard [OPTIONS] <DIRECTORY>"
)]
pub struct Cli {
    /// Directory to watch, recursively.
    #[arg(value_name = "DIRECTORY")]
    directory: PathBuf,
    /// Lower threshold for snarkiness (lines).
    #[arg(short = 's', long = "snark", value_name = "N")]
    snark: Option<u64>,
    /// Lower threshold for passive-aggressiveness (lines).
    #[arg(short = 'p', long = "passive-aggressive", value_name = "N")]
    passive: Option<u64>,
    /// Lower threshold for great justice (lines).
    #[arg(short = 'j', long = "truly-just", value_name = "N")]
    just: Option<u64>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Extra ignore regex, matched against the path relative to DIRECTORY. Repeatable.
    #[arg(long = "ignore", value_name = "REGEX")]
    ignore: Vec<String>,
    /// Pause after each notification, in milliseconds.
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,
    /// Per-event diagnostics on stderr.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// No startup line.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Layer flags over the loaded configuration.
    fn apply_to(&self, cfg: &mut Config) {
        cfg.watch.root.clone_from(&self.directory);
        if let Some(snark) = self.snark {
            cfg.thresholds.snark = snark;
        }
        if let Some(passive) = self.passive {
            cfg.thresholds.passive = passive;
        }
        if let Some(just) = self.just {
            cfg.thresholds.just = just;
        }
        if let Some(delay) = self.delay_ms {
            cfg.pacing.message_delay_ms = delay;
        }
        cfg.watch.ignore_patterns.extend(self.ignore.iter().cloned());
    }

    const fn watch_args(&self) -> WatchArgs {
        WatchArgs {
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flags, config file or directory.
    #[error("{0}")]
    Config(GuardError),
    /// Failure after the watch started.
    #[error("{0}")]
    Runtime(GuardError),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Runtime(_) => 3,
        }
    }
}

impl From<GuardError> for CliError {
    fn from(err: GuardError) -> Self {
        if err.is_config() {
            Self::Config(err)
        } else {
            Self::Runtime(err)
        }
    }
}

/// Resolve configuration and watch until interrupted.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let cfg = resolve_config(cli)?;
    let mut daemon = GuardDaemon::init(cfg, cli.watch_args())?;
    daemon.run()?;
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<Config, GuardError> {
    let mut cfg = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut cfg);
    cfg.validate()?;
    cfg.validate_root()?;
    Ok(cfg)
}
