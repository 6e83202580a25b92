//! Discard sink: moves files into a recoverable trash instead of deleting them.
//!
//! On Linux and other freedesktop systems the layout follows the FreeDesktop.org trash layout:
//! `$XDG_DATA_HOME/Trash/files/<name>` plus `info/<name>.trashinfo` recording
//! the original path and deletion time. A file on a different device than the
//! home trash goes to `$topdir/.Trash-$uid` on its own mount. On macOS files
//! are moved flat into `~/.Trash`.

#![allow(missing_docs)]

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{GuardError, Result};

/// Extension of the per-item info record.
pub const TRASHINFO_EXTENSION: &str = "trashinfo";

/// Moves a file somewhere it can be recovered from.
pub trait Discard: Send + Sync {
    /// Discard `path`, returning where it ended up.
    fn discard(&self, path: &Path) -> Result<PathBuf>;
}

/// How a trash directory is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashLayout {
    /// `files/` + `info/*.trashinfo`.
    FreeDesktop,
    /// Items directly in the directory.
    Flat,
}

/// A trash directory on disk.
#[derive(Debug, Clone)]
pub struct TrashCan {
    root: PathBuf,
    layout: TrashLayout,
    per_device: bool,
}

impl TrashCan {
    /// Freedesktop trash rooted at an explicit directory, no per-device lookup.
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: TrashLayout::FreeDesktop,
            per_device: false,
        }
    }

    /// The user's platform trash.
    #[must_use]
    pub fn home() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);
        if cfg!(target_os = "macos") {
            return Self {
                root: home.join(".Trash"),
                layout: TrashLayout::Flat,
                per_device: false,
            };
        }
        let data_home = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| home.join(".local").join("share"));
        Self {
            root: data_home.join("Trash"),
            layout: TrashLayout::FreeDesktop,
            per_device: cfg!(unix),
        }
    }

    /// Explicit directory if given, otherwise the platform trash.
    #[must_use]
    pub fn from_override(dir: Option<&Path>) -> Self {
        dir.map_or_else(Self::home, Self::at)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn layout(&self) -> TrashLayout {
        self.layout
    }

    fn files_dir(root: &Path, layout: TrashLayout) -> PathBuf {
        match layout {
            TrashLayout::FreeDesktop => root.join("files"),
            TrashLayout::Flat => root.to_path_buf(),
        }
    }

    /// Trash root to use for `path`: the home trash, or the per-device one
    /// when `path` lives on another filesystem.
    fn root_for(&self, path: &Path) -> PathBuf {
        if !self.per_device {
            return self.root.clone();
        }
        device_trash_root(path, &self.root).unwrap_or_else(|| self.root.clone())
    }

    /// Discard into `root`, retrying in the home trash when a per-device
    /// root can't take the file.
    fn discard_via(&self, root: &Path, path: &Path) -> Result<PathBuf> {
        if root == self.root {
            return self.discard_into(root, path);
        }
        match self.discard_into(root, path) {
            Err(err) if !matches!(err, GuardError::ScriptVanished { .. }) => {
                self.discard_into(&self.root, path)
            }
            outcome => outcome,
        }
    }

    fn discard_into(&self, root: &Path, path: &Path) -> Result<PathBuf> {
        let files_dir = Self::files_dir(root, self.layout);
        fs::create_dir_all(&files_dir).map_err(|e| GuardError::io(&files_dir, e))?;

        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| GuardError::Trash {
                path: path.to_path_buf(),
                details: "path has no file name".to_string(),
            })?;

        let (name, info_path) = match self.layout {
            TrashLayout::FreeDesktop => {
                let info_dir = root.join("info");
                fs::create_dir_all(&info_dir).map_err(|e| GuardError::io(&info_dir, e))?;
                let (name, info_path) = reserve_info(&info_dir, &files_dir, &base, path)?;
                (name, Some(info_path))
            }
            TrashLayout::Flat => (unique_name(&files_dir, &base), None),
        };

        let target = files_dir.join(&name);
        if let Err(err) = move_file(path, &target) {
            if let Some(info) = &info_path {
                let _ = fs::remove_file(info);
            }
            return Err(err);
        }
        Ok(target)
    }
}

impl Discard for TrashCan {
    fn discard(&self, path: &Path) -> Result<PathBuf> {
        let meta = fs::symlink_metadata(path).map_err(|e| GuardError::script_io(path, e))?;
        if meta.is_dir() {
            return Err(GuardError::Trash {
                path: path.to_path_buf(),
                details: "refusing to trash a directory".to_string(),
            });
        }
        let absolute = std::path::absolute(path).map_err(|e| GuardError::io(path, e))?;
        let root = self.root_for(&absolute);
        self.discard_via(&root, &absolute)
    }
}

/// Pick a free name and atomically claim it by creating the `.trashinfo` file.
fn reserve_info(
    info_dir: &Path,
    files_dir: &Path,
    base: &str,
    original: &Path,
) -> Result<(String, PathBuf)> {
    let body = trashinfo_body(original, &chrono::Local::now().naive_local());
    for attempt in 1..=10_000u32 {
        let name = candidate_name(base, attempt);
        if files_dir.join(&name).exists() {
            continue;
        }
        let info_path = info_dir.join(format!("{name}.{TRASHINFO_EXTENSION}"));
        match OpenOptions::new().write(true).create_new(true).open(&info_path) {
            Ok(mut f) => {
                f.write_all(body.as_bytes())
                    .map_err(|e| GuardError::io(&info_path, e))?;
                return Ok((name, info_path));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(GuardError::io(&info_path, e)),
        }
    }
    Err(GuardError::Trash {
        path: original.to_path_buf(),
        details: format!("no free trash name for {base}"),
    })
}

fn unique_name(dir: &Path, base: &str) -> String {
    (1..)
        .map(|attempt| candidate_name(base, attempt))
        .find(|name| !dir.join(name).exists())
        .unwrap_or_else(|| base.to_string())
}

/// `deploy.sh`, `deploy.2.sh`, `deploy.3.sh`, ...
#[must_use]
pub fn candidate_name(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        return base.to_string();
    }
    match base.rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{attempt}{}", &base[..dot], &base[dot..]),
        _ => format!("{base}.{attempt}"),
    }
}

/// Contents of a `.trashinfo` record.
#[must_use]
pub fn trashinfo_body(original: &Path, deleted_at: &chrono::NaiveDateTime) -> String {
    format!(
        "[Trash Info]\nPath={}\nDeletionDate={}\n",
        percent_encode_path(original),
        deleted_at.format("%Y-%m-%dT%H:%M:%S")
    )
}

/// Percent-encode a path for a `.trashinfo` `Path=` key, keeping `/` and
/// unreserved characters.
#[must_use]
pub fn percent_encode_path(path: &Path) -> String {
    let raw = path.as_os_str().as_encoded_bytes();
    let mut out = String::with_capacity(raw.len());
    for &b in raw {
        if b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|e| GuardError::io(to, e))?;
            fs::remove_file(from).map_err(|e| GuardError::script_io(from, e))
        }
        Err(e) => Err(GuardError::script_io(from, e)),
    }
}

#[cfg(unix)]
fn device_trash_root(path: &Path, home_root: &Path) -> Option<PathBuf> {
    use std::os::unix::fs::MetadataExt as _;

    let file_dev = fs::metadata(path).ok()?.dev();
    let home_dev = home_root
        .ancestors()
        .find_map(|p| fs::metadata(p).ok())?
        .dev();
    if file_dev == home_dev {
        return None;
    }

    // Walk up to the mount point: the last ancestor still on the file's device.
    let mut topdir = path.parent()?;
    while let Some(parent) = topdir.parent() {
        match fs::metadata(parent) {
            Ok(meta) if meta.dev() == file_dev => topdir = parent,
            _ => break,
        }
    }
    let uid = nix::unistd::getuid().as_raw();
    Some(topdir.join(format!(".Trash-{uid}")))
}

#[cfg(not(unix))]
fn device_trash_root(_path: &Path, _home_root: &Path) -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discard_moves_file_and_writes_info() {
        let work = tempfile::tempdir().unwrap();
        let trash = tempfile::tempdir().unwrap();
        let script = work.path().join("deploy.sh");
        fs::write(&script, "#!/bin/sh\necho big\n").unwrap();

        let can = TrashCan::at(trash.path());
        let landed = can.discard(&script).unwrap();

        assert!(!script.exists());
        assert_eq!(landed, trash.path().join("files").join("deploy.sh"));
        assert_eq!(
            fs::read_to_string(&landed).unwrap(),
            "#!/bin/sh\necho big\n"
        );

        let info =
            fs::read_to_string(trash.path().join("info").join("deploy.sh.trashinfo")).unwrap();
        assert!(info.starts_with("[Trash Info]\n"));
        assert!(info.contains(&format!("Path={}", percent_encode_path(&script))));
        assert!(info.contains("DeletionDate="));
    }

    #[test]
    fn name_collisions_get_numbered() {
        let work = tempfile::tempdir().unwrap();
        let trash = tempfile::tempdir().unwrap();
        let can = TrashCan::at(trash.path());

        for _ in 0..3 {
            let script = work.path().join("deploy.sh");
            fs::write(&script, "#!/bin/sh\n").unwrap();
            can.discard(&script).unwrap();
        }

        let files = trash.path().join("files");
        assert!(files.join("deploy.sh").exists());
        assert!(files.join("deploy.2.sh").exists());
        assert!(files.join("deploy.3.sh").exists());
        assert!(
            trash
                .path()
                .join("info")
                .join("deploy.3.sh.trashinfo")
                .exists()
        );
    }

    #[test]
    fn vanished_file_is_reported() {
        let work = tempfile::tempdir().unwrap();
        let trash = tempfile::tempdir().unwrap();
        let err = TrashCan::at(trash.path())
            .discard(&work.path().join("gone.sh"))
            .unwrap_err();
        assert_eq!(err.code(), "BG-2002");
        assert!(!trash.path().join("info").join("gone.sh.trashinfo").exists());
    }

    #[test]
    fn directories_are_refused() {
        let work = tempfile::tempdir().unwrap();
        let trash = tempfile::tempdir().unwrap();
        let err = TrashCan::at(trash.path()).discard(work.path()).unwrap_err();
        assert_eq!(err.code(), "BG-3002");
        assert!(work.path().exists());
    }

    #[test]
    fn unusable_device_trash_falls_back_to_home_trash() {
        let work = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let script = work.path().join("deploy.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        // A regular file where the mount's trash directory would go.
        let blocker = work.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let can = TrashCan::at(home.path());
        let landed = can
            .discard_via(&blocker.join(".Trash-1000"), &script)
            .unwrap();

        assert!(!script.exists());
        assert_eq!(landed, home.path().join("files").join("deploy.sh"));
        assert!(home.path().join("info").join("deploy.sh.trashinfo").exists());
    }

    #[test]
    fn vanished_file_is_not_retried() {
        let work = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let device = tempfile::tempdir().unwrap();
        let can = TrashCan::at(home.path());

        let err = can
            .discard_via(device.path(), &work.path().join("gone.sh"))
            .unwrap_err();
        assert_eq!(err.code(), "BG-2002");
        assert!(!home.path().join("files").exists());
    }

    #[test]
    fn candidate_names() {
        assert_eq!(candidate_name("run.sh", 1), "run.sh");
        assert_eq!(candidate_name("run.sh", 2), "run.2.sh");
        assert_eq!(candidate_name("Makefile", 3), "Makefile.3");
        assert_eq!(candidate_name(".profile", 2), ".profile.2");
    }

    #[test]
    fn paths_are_percent_encoded() {
        assert_eq!(
            percent_encode_path(Path::new("/home/me/my script.sh")),
            "/home/me/my%20script.sh"
        );
        assert_eq!(percent_encode_path(Path::new("/a/b_c-d.e~")), "/a/b_c-d.e~");
    }

    #[test]
    fn trashinfo_date_format() {
        let at = chrono::NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let body = trashinfo_body(Path::new("/w/x.sh"), &at);
        assert_eq!(
            body,
            "[Trash Info]\nPath=/w/x.sh\nDeletionDate=2026-10-17T09:05:03\n"
        );
    }
}
