//! Path helpers shared by config and the watcher.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Absolute form of `path`.
///
/// Existing paths are canonicalized so symlinked roots compare equal to the
/// paths the OS reports in change events. Missing paths are joined onto the
/// CWD and `.`/`..` resolved lexically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    std::fs::canonicalize(&absolute).unwrap_or_else(|_| lexical_normalize(&absolute))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut kept: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(kept.last(), Some(Component::Normal(_))) {
                    kept.pop();
                }
            }
            other => kept.push(other),
        }
    }
    kept.into_iter().collect()
}

/// `path` relative to `root`, `/`-separated, for ignore matching.
///
/// Paths outside `root` come back whole.
#[must_use]
pub fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_path_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_absolute_path(dir.path());
        assert_eq!(resolved, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn missing_path_is_normalized_lexically() {
        let input = Path::new("/nonexistent-bg/a/../b/./c");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(resolve_absolute_path(input), Path::new("/nonexistent-bg/b/c"));
    }

    #[cfg(unix)]
    #[test]
    fn parent_of_root_stays_root() {
        assert_eq!(lexical_normalize(Path::new("/../x")), Path::new("/x"));
    }

    #[test]
    fn relative_display_strips_root() {
        let root = Path::new("/w/proj");
        assert_eq!(relative_display(root, &root.join("bin").join("run.sh")), "bin/run.sh");
        assert_eq!(relative_display(root, Path::new("/elsewhere/x.sh")), "elsewhere/x.sh");
    }
}
