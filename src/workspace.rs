//! Project root discovery and root-confined path resolution.
//!
//! Every tool path is joined against the project root; anything that would
//! resolve outside the root is rejected before any I/O happens.

use anyhow::{Result, anyhow};
use std::path::{Component, Path, PathBuf};

/// Walks upward from `start` looking for a `.git` directory or `Cargo.toml`.
/// Falls back to `start` itself when no marker is found.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(".git").exists() || current.join("Cargo.toml").exists() {
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return start.to_path_buf(),
        }
    }
}

/// Joins `relative` against `root`, normalizing `.` and `..` components
/// lexically so escapes are caught even for paths that do not exist yet.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        return Err(anyhow!(
            "Access denied: absolute path '{relative}' is outside the project root."
        ));
    }

    let mut resolved = root.to_path_buf();
    let mut depth: usize = 0;
    for component in candidate.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(anyhow!(
                        "Access denied: path '{relative}' escapes the project root."
                    ));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!(
                    "Access denied: path '{relative}' is outside the project root."
                ));
            }
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_inside_root() {
        let root = Path::new("/project");
        assert_eq!(
            resolve(root, "src/main.rs").unwrap(),
            PathBuf::from("/project/src/main.rs")
        );
    }

    #[test]
    fn test_resolve_normalizes_dot_components() {
        let root = Path::new("/project");
        assert_eq!(
            resolve(root, "./src/../src/lib.rs").unwrap(),
            PathBuf::from("/project/src/lib.rs")
        );
    }

    #[test]
    fn test_rejects_escape_via_parent_components() {
        let root = Path::new("/project");
        let err = resolve(root, "../secrets.txt").unwrap_err();
        assert!(err.to_string().contains("Access denied"));
    }

    #[test]
    fn test_rejects_nested_escape() {
        let root = Path::new("/project");
        assert!(resolve(root, "src/../../other").is_err());
    }

    #[test]
    fn test_rejects_absolute_path() {
        let root = Path::new("/project");
        assert!(resolve(root, "/etc/passwd").is_err());
    }

    #[test]
    fn test_find_project_root_by_git_marker() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("repo");
        let nested = root.join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(root.join(".git")).unwrap();

        assert_eq!(find_project_root(&nested), root);
    }

    #[test]
    fn test_find_project_root_falls_back_to_start() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("plain");
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(find_project_root(&dir), dir);
    }
}
