pub mod project;
pub mod service;

pub use project::{Project, ProjectState, ProjectStats};
pub use service::{CancellationToken, IndexOptions, IndexProjectOutcome, IndexingService, DEFAULT_COLLECTION};
