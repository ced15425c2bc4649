//! Project scanner: a flat, sorted list of project-relative file paths
//! honoring `.gitignore` plus a built-in ignore list.

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use std::path::PathBuf;

/// Directories that are never useful as model context, ignored even when no
/// `.gitignore` mentions them.
const ALWAYS_IGNORED: &[&str] = &[".git", "node_modules", ".tern", "target", "dist"];

pub struct ProjectScanner {
    root: PathBuf,
}

impl ProjectScanner {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Walks the project root and returns relative paths of all files that
    /// survive the ignore rules.
    pub fn scan(&self) -> Vec<String> {
        let mut overrides = OverrideBuilder::new(&self.root);
        for ignored in ALWAYS_IGNORED {
            // An override starting with '!' excludes matches.
            let _ = overrides.add(&format!("!{ignored}"));
        }

        let mut walker = WalkBuilder::new(&self.root);
        walker.hidden(false).require_git(false).follow_links(false);
        if let Ok(overrides) = overrides.build() {
            walker.overrides(overrides);
        }

        let mut files: Vec<String> = walker
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_lists_relative_paths() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("main.rs"), "fn main() {}").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/lib.rs"), "").unwrap();

        let files = ProjectScanner::new(tmp.path().to_path_buf()).scan();
        assert_eq!(files, vec!["main.rs".to_string(), "sub/lib.rs".to_string()]);
    }

    #[test]
    fn test_scan_skips_always_ignored_dirs() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("kept.txt"), "").unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "ref").unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/index.js"), "").unwrap();

        let files = ProjectScanner::new(tmp.path().to_path_buf()).scan();
        assert_eq!(files, vec!["kept.txt".to_string()]);
    }

    #[test]
    fn test_scan_honors_gitignore() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(tmp.path().join("app.log"), "noise").unwrap();
        fs::write(tmp.path().join("app.rs"), "").unwrap();

        let files = ProjectScanner::new(tmp.path().to_path_buf()).scan();
        assert!(files.contains(&"app.rs".to_string()));
        assert!(!files.contains(&"app.log".to_string()));
    }
}
