#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_bash-guard") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "bash-guard.exe"
    } else {
        "bash-guard"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve bash-guard binary path for integration test"),
    }
}

/// Command with state isolated under `state`: no user config, no desktop
/// popups, log and trash inside the sandbox.
pub fn isolated_command(state: &Path) -> Command {
    let mut cmd = Command::new(resolve_bin_path());
    cmd.env("HOME", state)
        .env("XDG_DATA_HOME", state.join("data"))
        .env("BASH_GUARD_DESKTOP", "false")
        .env("BASH_GUARD_JSONL_LOG", state.join("activity.jsonl"))
        .env("BASH_GUARD_TRASH_DIR", state.join("Trash"))
        .env("RUST_BACKTRACE", "1");
    cmd
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let state = tempfile::tempdir().expect("create state dir");
    let root = std::env::temp_dir().join("bash-guard-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));

    let output = isolated_command(state.path())
        .args(args)
        .output()
        .expect("execute bash-guard command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Start a long-running watch with piped output.
pub fn spawn_watch(state: &Path, args: &[&str]) -> Child {
    isolated_command(state)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn bash-guard")
}

/// Poll `cond` every 20ms for up to `timeout`.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

/// A script with `header` as its first line and `newlines` newline bytes in total.
pub fn script_with_newlines(header: &str, newlines: usize) -> String {
    let mut body = String::from(header);
    body.push('\n');
    for i in 1..newlines {
        body.push_str(&format!("echo {i}\n"));
    }
    body
}
