// FileScanner: walks a root directory with ignore::WalkBuilder, applying
// IgnoreRules, and streams typed lifecycle events over a channel instead of
// just returning a flat Vec.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ignore::gitignore::Gitignore;
use ignore::WalkBuilder;
use tokio::sync::mpsc;

use crate::error::{IndexError, Result};
use crate::ignore_rules::IgnoreRules;

#[derive(Debug, Clone)]
pub enum ScanEvent {
    DirectoryEntered { path: PathBuf },
    FileFound { path: PathBuf },
    FileScanned { path: PathBuf },
    ScanComplete {
        total_files: usize,
        excluded_files: usize,
        duration_ms: u64,
    },
}

pub struct FileScanner {
    root: PathBuf,
    custom_excludes: Vec<String>,
    extension_allowlist: Option<Vec<String>>,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>, custom_excludes: Vec<String>, extension_allowlist: Option<Vec<String>>) -> Self {
        Self {
            root: root.into(),
            custom_excludes,
            extension_allowlist,
        }
    }

    /// Walks the tree depth-first, streaming lifecycle events to `tx`.
    /// Individual per-directory read failures are skipped silently and
    /// counted toward `excluded_files`.
    pub async fn scan(&self, tx: mpsc::Sender<ScanEvent>) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(IndexError::InvalidParams {
                message: format!("{} is not a directory", self.root.display()),
            });
        }

        let rules = IgnoreRules::new(&self.root, &self.custom_excludes, self.extension_allowlist.clone())?;
        let started = Instant::now();
        let mut included = Vec::new();
        let mut excluded_files = 0usize;

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .build();

        // Per-directory .gitignore/.mcpignore chain, keyed by the depth of
        // the directory that contributed each entry. Popped back to the
        // current entry's ancestors before every exclusion check.
        let mut chain_stack: Vec<(usize, Gitignore)> = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => {
                    excluded_files += 1;
                    continue;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let depth = entry.depth();

            while chain_stack.last().is_some_and(|(d, _)| *d >= depth) {
                chain_stack.pop();
            }
            let chain: Vec<Gitignore> = chain_stack.iter().map(|(_, gi)| gi.clone()).collect();

            if is_dir {
                if path != self.root {
                    let _ = tx.send(ScanEvent::DirectoryEntered { path: path.to_path_buf() }).await;
                }
                if !rules.should_exclude(path, true, &chain) {
                    if let Some(gi) = IgnoreRules::load_directory_ignores(path) {
                        chain_stack.push((depth, gi));
                    }
                }
                continue;
            }

            let _ = tx.send(ScanEvent::FileFound { path: path.to_path_buf() }).await;

            if rules.should_exclude(path, false, &chain) || !rules.is_supported_file(path) {
                excluded_files += 1;
                continue;
            }

            included.push(path.to_path_buf());
            let _ = tx.send(ScanEvent::FileScanned { path: path.to_path_buf() }).await;
        }

        let _ = tx
            .send(ScanEvent::ScanComplete {
                total_files: included.len(),
                excluded_files,
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await;

        Ok(included)
    }
}

pub fn is_within(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn scans_mixed_tree_excluding_ignored_paths() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        std::fs::write(tmp.path().join("src/a.ts"), "const a = 1;").unwrap();
        std::fs::write(tmp.path().join("src/b.py"), "a = 1").unwrap();
        std::fs::write(tmp.path().join("node_modules/x.js"), "x").unwrap();
        std::fs::write(tmp.path().join(".env"), "SECRET=1").unwrap();
        std::fs::write(tmp.path().join("README.md"), "# hi").unwrap();

        let scanner = FileScanner::new(tmp.path(), Vec::new(), None);
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { scanner.scan(tx).await });
        while rx.recv().await.is_some() {}
        let files = handle.await.unwrap().unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"src/a.ts".to_string()));
        assert!(names.contains(&"src/b.py".to_string()));
        assert!(names.contains(&"README.md".to_string()));
    }

    #[tokio::test]
    async fn nested_gitignore_excludes_matching_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        std::fs::write(tmp.path().join("pkg/.gitignore"), "generated.rs\n").unwrap();
        std::fs::write(tmp.path().join("pkg/generated.rs"), "fn gen() {}").unwrap();
        std::fs::write(tmp.path().join("pkg/lib.rs"), "fn lib() {}").unwrap();

        let scanner = FileScanner::new(tmp.path(), Vec::new(), None);
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { scanner.scan(tx).await });
        while rx.recv().await.is_some() {}
        let files = handle.await.unwrap().unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert!(names.contains(&"pkg/lib.rs".to_string()));
        assert!(!names.contains(&"pkg/generated.rs".to_string()));
    }

    #[tokio::test]
    async fn mcpignore_excludes_matching_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".mcpignore"), "scratch.rs\n").unwrap();
        std::fs::write(tmp.path().join("scratch.rs"), "fn s() {}").unwrap();
        std::fs::write(tmp.path().join("main.rs"), "fn main() {}").unwrap();

        let scanner = FileScanner::new(tmp.path(), Vec::new(), None);
        let (tx, mut rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move { scanner.scan(tx).await });
        while rx.recv().await.is_some() {}
        let files = handle.await.unwrap().unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert!(names.contains(&"main.rs".to_string()));
        assert!(!names.contains(&"scratch.rs".to_string()));
    }

    #[tokio::test]
    async fn non_directory_root_fails() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        std::fs::write(&file, "x").unwrap();
        let scanner = FileScanner::new(file, Vec::new(), None);
        let (tx, _rx) = mpsc::channel(1);
        assert!(scanner.scan(tx).await.is_err());
    }
}
