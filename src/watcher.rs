// FileWatcher: debounced filesystem watch filtered through the scanner's
// full IgnoreRules, with a configurable debounce duration (default 500ms).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ignore::gitignore::Gitignore;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{IndexError, Result};
use crate::ignore_rules::IgnoreRules;

const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    FileAdded(PathBuf),
    FileChanged(PathBuf),
    FileDeleted(PathBuf),
    Ready,
    Error(String),
}

pub struct FileWatcher {
    root: PathBuf,
    debounce: Duration,
    rules: Arc<IgnoreRules>,
    known_paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FileWatcher {
    pub fn new(root: impl Into<PathBuf>, rules: Arc<IgnoreRules>) -> Self {
        Self {
            root: root.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            rules,
            known_paths: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Seeds the watcher with paths a prior scan already indexed, so those
    /// files classify as `FileChanged` rather than `FileAdded` the first
    /// time a watch event touches them.
    pub fn with_known_paths(self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.known_paths.lock().extend(paths);
        self
    }

    /// Starts watching `self.root`, forwarding debounced add/change/delete
    /// events that pass the scanner's inclusion rules. The returned debouncer
    /// must be kept alive for the watch to continue; dropping it stops
    /// watching (this is `stop`/`isWatching` expressed through ownership).
    pub fn start(&self, tx: mpsc::Sender<WatchEvent>) -> Result<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
        let root = self.root.clone();
        let watch_root = root.clone();
        let rules = self.rules.clone();
        let known_paths = self.known_paths.clone();
        let tx_events = tx.clone();

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        let path = event.path.clone();
                        let chain = build_chain(&root, &path);
                        if rules.should_exclude(&path, path.is_dir(), &chain) {
                            continue;
                        }
                        if !rules.is_supported_file(&path) {
                            continue;
                        }
                        let watch_event = match event.kind {
                            DebouncedEventKind::Any => classify(&path, &known_paths),
                            DebouncedEventKind::AnyContinuous => classify(&path, &known_paths),
                            _ => classify(&path, &known_paths),
                        };
                        let _ = tx_events.blocking_send(watch_event);
                    }
                }
                Err(err) => {
                    let _ = tx_events.blocking_send(WatchEvent::Error(err.to_string()));
                }
            }
        })
        .map_err(|e| IndexError::Internal {
            message: format!("failed to start file watcher: {}", e),
            source: None,
        })?;

        debouncer
            .watcher()
            .watch(&watch_root, RecursiveMode::Recursive)
            .map_err(|e| IndexError::Internal {
                message: format!("failed to watch {}: {}", watch_root.display(), e),
                source: None,
            })?;

        let _ = tx.blocking_send(WatchEvent::Ready);
        Ok(debouncer)
    }
}

/// A rename surfaces as delete-then-add at the OS level; this watcher
/// observes existence at dispatch time rather than tracking prior OS-level
/// state. A path seen here for the first time while it exists is reported
/// as `FileAdded`; a path already in `known_paths` is `FileChanged`; an
/// absent path is `FileDeleted` and is forgotten so a later recreation is
/// reported as `FileAdded` again.
fn classify(path: &Path, known_paths: &Mutex<HashSet<PathBuf>>) -> WatchEvent {
    if path.exists() {
        let mut known = known_paths.lock();
        if known.insert(path.to_path_buf()) {
            WatchEvent::FileAdded(path.to_path_buf())
        } else {
            WatchEvent::FileChanged(path.to_path_buf())
        }
    } else {
        known_paths.lock().remove(path);
        WatchEvent::FileDeleted(path.to_path_buf())
    }
}

/// Collects the `.gitignore`/`.mcpignore` chain for `path`'s ancestor
/// directories between `root` and `path`'s parent, root-first.
fn build_chain(root: &Path, path: &Path) -> Vec<Gitignore> {
    let mut dirs = Vec::new();
    let mut current = path.parent();
    while let Some(dir) = current {
        dirs.push(dir.to_path_buf());
        if dir == root || !dir.starts_with(root) {
            break;
        }
        current = dir.parent();
    }
    dirs.reverse();
    dirs.iter().filter_map(|d| IgnoreRules::load_directory_ignores(d)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classify_reports_deleted_for_absent_path() {
        let known = Mutex::new(HashSet::new());
        let event = classify(Path::new("/nonexistent/path/definitely"), &known);
        assert_eq!(event, WatchEvent::FileDeleted(PathBuf::from("/nonexistent/path/definitely")));
    }

    #[test]
    fn classify_reports_added_then_changed_for_new_path() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("new.rs");
        std::fs::write(&file, "fn f() {}").unwrap();
        let known = Mutex::new(HashSet::new());

        assert_eq!(classify(&file, &known), WatchEvent::FileAdded(file.clone()));
        assert_eq!(classify(&file, &known), WatchEvent::FileChanged(file.clone()));
    }

    #[test]
    fn classify_reports_added_again_after_delete() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("cycled.rs");
        std::fs::write(&file, "fn f() {}").unwrap();
        let known = Mutex::new(HashSet::new());

        assert_eq!(classify(&file, &known), WatchEvent::FileAdded(file.clone()));
        std::fs::remove_file(&file).unwrap();
        assert_eq!(classify(&file, &known), WatchEvent::FileDeleted(file.clone()));
        std::fs::write(&file, "fn f() {}").unwrap();
        assert_eq!(classify(&file, &known), WatchEvent::FileAdded(file.clone()));
    }

    #[test]
    fn build_chain_collects_nested_gitignore_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        std::fs::write(tmp.path().join("pkg/.gitignore"), "generated.rs\n").unwrap();
        let target = tmp.path().join("pkg/generated.rs");
        std::fs::write(&target, "fn gen() {}").unwrap();

        let chain = build_chain(tmp.path(), &target);
        assert_eq!(chain.len(), 1);
        assert!(chain[0].matched(&target, false).is_ignore());
    }
}
