use std::sync::Arc;

use crate::store::{LessonStore, ProfileDirectory};

/// Handles shared by every handler. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub lessons: Arc<dyn LessonStore>,
    pub directory: Arc<dyn ProfileDirectory>,
    pub batch_concurrency: usize,
}

impl AppState {
    /// Uses one backend for both lessons and identity lookups.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: LessonStore + ProfileDirectory,
    {
        Self {
            lessons: store.clone(),
            directory: store,
            batch_concurrency: 1,
        }
    }

    pub fn with_batch_concurrency(mut self, n: usize) -> Self {
        self.batch_concurrency = n.max(1);
        self
    }
}
