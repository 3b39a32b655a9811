//! Persistence seams. The batch and listing code only ever talks to these traits;
//! `db::PgStore` and `memory::MemoryStore` are the two backends.

use async_trait::async_trait;

use crate::auth::Role;
use crate::error::StoreError;
use crate::models::{LessonPatch, LessonRecord, ListFilter, RawLessonRow};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait LessonStore: Send + Sync + 'static {
    /// Cheap connectivity probe, run once before a batch starts.
    async fn ping(&self) -> StoreResult<()>;

    /// Applies `patch` to one lesson and returns the stored result.
    async fn update_lesson(&self, id: &str, patch: &LessonPatch) -> StoreResult<LessonRecord>;

    /// Removes one lesson and returns its id.
    async fn delete_lesson(&self, id: &str) -> StoreResult<String>;

    /// Rows matching `filter`, already ordered by `filter.sort`/`filter.order`.
    async fn list_lessons(&self, filter: &ListFilter) -> StoreResult<Vec<RawLessonRow>>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync + 'static {
    /// Maps a session token to a user id, `None` when the session is unknown or expired.
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<String>>;

    async fn role_of(&self, user_id: &str) -> StoreResult<Option<Role>>;
}
