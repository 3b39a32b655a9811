//! Batch mutations: whole-batch size check, per-item processing with failure isolation,
//! and folding of per-item results into an outcome.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, StoreError};
use crate::models::{BatchSummary, BulkDeleteResp, BulkUpdateResp, LessonRecord};
use crate::store::LessonStore;
use crate::validation::{validate_delete_item, validate_update_item, ItemError, ValidatedUpdate};

pub const MAX_BATCH: usize = 100;

/// Client-facing text for item failures whose cause stays in the logs.
pub const MSG_INTERNAL: &str = "Internal error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeError {
    Empty,
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Update,
    Delete,
}

impl BatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOp::Update => "update",
            BatchOp::Delete => "delete",
        }
    }

    pub fn reject(&self, err: SizeError) -> ApiError {
        let msg = match (self, err) {
            (BatchOp::Update, SizeError::Empty) => {
                "Lesson updates array is required and cannot be empty".to_string()
            }
            (BatchOp::Delete, SizeError::Empty) => {
                "Lesson IDs array is required and cannot be empty".to_string()
            }
            (BatchOp::Update, SizeError::TooLarge) => {
                format!("Cannot update more than {MAX_BATCH} lessons at once")
            }
            (BatchOp::Delete, SizeError::TooLarge) => {
                format!("Cannot delete more than {MAX_BATCH} lessons at once")
            }
        };
        ApiError::RequestShape(msg)
    }
}

/// A missing list counts as empty.
pub fn validate_batch_size<T>(items: Option<&[T]>) -> Result<(), SizeError> {
    match items.map_or(0, <[T]>::len) {
        0 => Err(SizeError::Empty),
        n if n > MAX_BATCH => Err(SizeError::TooLarge),
        _ => Ok(()),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub items: Vec<T>,
    pub errors: Vec<ItemError>,
}

impl<T> BatchOutcome<T> {
    /// Folds per-item results, already in input order, into an outcome. The counters are
    /// derived from the partitions so they cannot disagree with them.
    pub fn from_results(results: Vec<Result<T, ItemError>>) -> Self {
        let total = results.len();
        let mut items = Vec::new();
        let mut errors = Vec::new();
        for r in results {
            match r {
                Ok(v) => items.push(v),
                Err(e) => errors.push(e),
            }
        }
        Self {
            total,
            success: items.len(),
            failed: errors.len(),
            items,
            errors,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.success + self.failed
            && self.items.len() == self.success
            && self.errors.len() == self.failed
    }

    /// Splits the outcome into the succeeded items and the summary that goes next to
    /// them in the response body.
    pub fn into_parts(self) -> (Vec<T>, BatchSummary) {
        debug_assert!(self.is_consistent());
        let summary = BatchSummary {
            total: self.total,
            success: self.success,
            failed: self.failed,
            errors: self.errors,
        };
        (self.items, summary)
    }
}

impl BatchOutcome<LessonRecord> {
    pub fn into_update_response(self) -> BulkUpdateResp {
        let (updated, summary) = self.into_parts();
        BulkUpdateResp { updated, summary }
    }
}

impl BatchOutcome<String> {
    pub fn into_delete_response(self) -> BulkDeleteResp {
        let (deleted, summary) = self.into_parts();
        BulkDeleteResp { deleted, summary }
    }
}

/// A validated item that names the lesson it targets.
pub trait Targeted {
    fn lesson_id(&self) -> &str;
}

impl Targeted for ValidatedUpdate {
    fn lesson_id(&self) -> &str {
        &self.id
    }
}

impl Targeted for String {
    fn lesson_id(&self) -> &str {
        self
    }
}

fn store_failure(index: usize, id: String, err: StoreError) -> ItemError {
    tracing::warn!(index, id = %id, error = %err, "lesson write failed");
    let message = match err {
        StoreError::NotFound | StoreError::Constraint(_) | StoreError::Malformed(_) => {
            err.to_string()
        }
        StoreError::Unavailable(_) | StoreError::Query(_) => MSG_INTERNAL.to_string(),
    };
    ItemError::new(index, Some(id), message)
}

/// Validates each item, then runs `apply` on the ones that pass. At most `concurrency`
/// store calls are in flight; results are put back in input order before folding.
async fn run_batch<V, T, F, Fut>(
    items: &[Value],
    concurrency: usize,
    validate: impl Fn(usize, &Value) -> Result<V, ItemError>,
    apply: F,
) -> BatchOutcome<T>
where
    V: Targeted,
    F: Fn(usize, V) -> Fut,
    Fut: Future<Output = Result<T, ItemError>>,
{
    let calls: Vec<_> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let call = validate(index, item).map(|v| {
                let id = v.lesson_id().to_string();
                (id, apply(index, v))
            });
            async move {
                let result = match call {
                    Err(e) => {
                        tracing::warn!(index, id = ?e.id, error = %e.error, "lesson item rejected");
                        Err(e)
                    }
                    // a panicking adapter only takes its own item down
                    Ok((id, fut)) => match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(r) => r,
                        Err(_) => {
                            tracing::error!(index, id = %id, "lesson store call panicked");
                            Err(ItemError::new(index, Some(id), MSG_INTERNAL))
                        }
                    },
                };
                (index, result)
            }
        })
        .collect();

    let mut results: Vec<(usize, Result<T, ItemError>)> = stream::iter(calls)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    BatchOutcome::from_results(results.into_iter().map(|(_, r)| r).collect())
}

pub async fn process_updates(
    store: &dyn LessonStore,
    items: &[Value],
    concurrency: usize,
) -> BatchOutcome<LessonRecord> {
    run_batch(items, concurrency, validate_update_item, |index, v| async move {
        let result = store.update_lesson(&v.id, &v.patch).await;
        result.map_err(|e| store_failure(index, v.id, e))
    })
    .await
}

pub async fn process_deletes(
    store: &dyn LessonStore,
    items: &[Value],
    concurrency: usize,
) -> BatchOutcome<String> {
    run_batch(items, concurrency, validate_delete_item, |index, id| async move {
        let result = store.delete_lesson(&id).await;
        result.map_err(|e| store_failure(index, id, e))
    })
    .await
}
