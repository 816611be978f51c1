// Dependency-injected observer hook ("shared module-level
// loggers and global telemetry manager -> dependency-injected logger and an
// optional observer interface with a no-op default"). The core itself only
// emits through `tracing`; this trait lets a host wire in its own metrics
// pipeline without the core depending on one.

pub trait IndexingObserver: Send + Sync {
    fn on_scan_progress(&self, project_id: &str, progress: u8) {
        let _ = (project_id, progress);
    }

    fn on_parse_progress(&self, project_id: &str, progress: u8) {
        let _ = (project_id, progress);
    }

    fn on_embed_progress(&self, project_id: &str, progress: u8) {
        let _ = (project_id, progress);
    }

    fn on_persist_progress(&self, project_id: &str, progress: u8) {
        let _ = (project_id, progress);
    }

    fn on_file_error(&self, project_id: &str, path: &str, message: &str) {
        let _ = (project_id, path, message);
    }

    fn on_indexed(&self, project_id: &str, indexed_files: usize, skipped_files: usize) {
        let _ = (project_id, indexed_files, skipped_files);
    }
}

/// No-op default, used when a host doesn't wire in an observer.
pub struct NoopObserver;

impl IndexingObserver for NoopObserver {}
