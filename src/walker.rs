//! Filesystem walker honoring ignore rules and size/count caps.
//!
//! Produces [`WalkedFile`]s for every indexable file under a root. Skipped
//! outright: hidden files and directories, `.git`, `node_modules`, build
//! output directories, lockfiles, and anything matched by `.gitignore` or
//! `.searchgrepignore` (both apply — the union of ignores). Files above
//! `max_file_size` are logged and omitted; the walk stops once
//! `max_file_count` files have been collected.
//!
//! [`IgnoreRules`] exposes the same decision for single paths so the
//! watcher filters events consistently with the walker.

use anyhow::{bail, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::WalkedFile;

/// Custom ignore file name, honored in addition to `.gitignore`.
pub const IGNORE_FILE: &str = ".searchgrepignore";

/// Directories never indexed, regardless of ignore files.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
];

/// Lockfiles never indexed.
const EXCLUDED_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
];

/// Walks a root directory into indexable files.
pub struct FileWalker {
    root: PathBuf,
    max_file_size: u64,
    max_file_count: usize,
}

impl FileWalker {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            max_file_size: config.max_file_size,
            max_file_count: config.max_file_count,
        }
    }

    /// Scan the tree, returning files sorted by path for deterministic
    /// ordering.
    pub fn walk(&self) -> Result<Vec<WalkedFile>> {
        if !self.root.exists() {
            bail!("directory does not exist: {}", self.root.display());
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILE)
            .build();

        let mut files = Vec::new();
        let mut capped = false;

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = relative_posix(&self.root, path);
            if in_excluded_dir(&relative) || is_excluded_file(&relative) {
                continue;
            }

            if files.len() >= self.max_file_count {
                capped = true;
                break;
            }

            let metadata = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    debug!("skipping {}: {}", relative, e);
                    continue;
                }
            };

            if metadata.len() > self.max_file_size {
                warn!(
                    "skipping {}: {} bytes exceeds maxFileSize {}",
                    relative,
                    metadata.len(),
                    self.max_file_size
                );
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    debug!("skipping {} (not valid UTF-8 text): {}", relative, e);
                    continue;
                }
            };

            files.push(WalkedFile {
                path: relative,
                content,
                size: metadata.len(),
                last_modified: mtime_millis(&metadata),
            });
        }

        if capped {
            warn!(
                "file count cap reached ({}); remaining files were not scanned",
                self.max_file_count
            );
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

/// Ignore decisions for single paths, shared by the watcher.
///
/// Combines the built-in exclusions with `.gitignore` and
/// `.searchgrepignore` from the root (missing files are fine).
pub struct IgnoreRules {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRules {
    pub fn load(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut builder = GitignoreBuilder::new(&root);
        let _ = builder.add(root.join(".gitignore"));
        let _ = builder.add(root.join(IGNORE_FILE));
        let matcher = builder.build().unwrap_or_else(|e| {
            warn!("failed to parse ignore files: {}", e);
            Gitignore::empty()
        });
        Self { root, matcher }
    }

    /// Should this path be excluded from indexing?
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = relative_posix(&self.root, path);
        if relative.is_empty() {
            return true;
        }
        if in_excluded_dir(&relative) || is_excluded_file(&relative) || has_hidden_component(&relative)
        {
            return true;
        }
        self.matcher
            .matched_path_or_any_parents(path, false)
            .is_ignore()
    }

    /// Repo-relative POSIX path for an absolute event path.
    pub fn relative(&self, path: &Path) -> String {
        relative_posix(&self.root, path)
    }
}

fn relative_posix(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let s = relative.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.to_string()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

fn in_excluded_dir(relative: &str) -> bool {
    relative
        .split('/')
        .any(|component| EXCLUDED_DIRS.contains(&component))
}

fn is_excluded_file(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    EXCLUDED_FILES.contains(&name)
}

fn has_hidden_component(relative: &str) -> bool {
    relative
        .split('/')
        .any(|component| component.starts_with('.') && component.len() > 1)
}

fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn walks_files_and_skips_junk() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "src/main.rs", "fn main() {}\n");
        write(root, "README.md", "# readme\n");
        write(root, ".hidden", "secret\n");
        write(root, "node_modules/pkg/index.js", "module.exports = 1;\n");
        write(root, "Cargo.lock", "[[package]]\n");

        let config = Config::default();
        let files = FileWalker::new(root, &config).walk().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["README.md", "src/main.rs"]);
        assert!(files[1].content.contains("fn main"));
        assert!(files[1].size > 0);
    }

    #[test]
    fn honors_custom_ignore_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, IGNORE_FILE, "generated/\n*.min.js\n");
        write(root, "generated/schema.rs", "pub struct S;\n");
        write(root, "app.min.js", "var a=1;\n");
        write(root, "app.js", "var a = 1;\n");

        let config = Config::default();
        let files = FileWalker::new(root, &config).walk().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["app.js"]);
    }

    #[test]
    fn oversize_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "big.txt", &"x".repeat(4096));
        write(root, "small.txt", "ok\n");

        let mut config = Config::default();
        config.max_file_size = 1024;
        let files = FileWalker::new(root, &config).walk().unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        assert_eq!(paths, vec!["small.txt"]);
    }

    #[test]
    fn file_count_cap_bounds_the_walk() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for i in 0..8 {
            write(root, &format!("f{}.txt", i), "data\n");
        }

        let mut config = Config::default();
        config.max_file_count = 3;
        let files = FileWalker::new(root, &config).walk().unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn ignore_rules_match_walker_decisions() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, ".gitignore", "logs/\n");
        write(root, "kept.rs", "fn x() {}\n");

        let rules = IgnoreRules::load(root);
        assert!(!rules.is_ignored(&root.join("kept.rs")));
        assert!(rules.is_ignored(&root.join("logs/app.log")));
        assert!(rules.is_ignored(&root.join(".env")));
        assert!(rules.is_ignored(&root.join("node_modules/pkg/index.js")));
        assert!(rules.is_ignored(&root.join("yarn.lock")));
        assert_eq!(rules.relative(&root.join("src/lib.rs")), "src/lib.rs");
    }
}
