//! In-process store used by `LESSONS_STORE=memory` and by the test suite.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::RwLock;

use crate::auth::Role;
use crate::error::StoreError;
use crate::models::{LessonPatch, LessonRecord, ListFilter, RawLessonRow, SortKey, SortOrder};
use crate::store::{LessonStore, ProfileDirectory, StoreResult};
use crate::validation::{parse_date, parse_timestamp, reconcile_row};

#[derive(Debug, Clone)]
struct MemoryProfile {
    role: Option<Role>,
    full_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    lessons: RwLock<Vec<RawLessonRow>>,
    sessions: RwLock<HashMap<String, String>>,
    profiles: RwLock<HashMap<String, MemoryProfile>>,
    failing: RwLock<HashSet<String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Stores `row` as-is, malformed or not.
    pub async fn insert_row(&self, row: RawLessonRow) {
        self.lessons.write().await.push(row);
    }

    pub async fn add_session(&self, token: &str, user_id: &str) {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), user_id.to_string());
    }

    pub async fn add_profile(&self, user_id: &str, role: Option<Role>, full_name: Option<&str>) {
        self.profiles.write().await.insert(
            user_id.to_string(),
            MemoryProfile {
                role,
                full_name: full_name.map(str::to_string),
            },
        );
    }

    /// Makes every write against `id` fail with a constraint error.
    pub async fn fail_on(&self, id: &str) {
        self.failing.write().await.insert(id.to_string());
    }

    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, AtomicOrdering::SeqCst);
    }

    pub async fn row(&self, id: &str) -> Option<RawLessonRow> {
        self.lessons
            .read()
            .await
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
    }

    fn check_up(&self) -> StoreResult<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    async fn check_writable(&self, id: &str) -> StoreResult<()> {
        self.check_up()?;
        if self.failing.read().await.contains(id) {
            return Err(StoreError::Constraint(format!("write to lesson {id} rejected")));
        }
        Ok(())
    }

    /// Fills in display copies of the student/teacher profiles, like the SQL join does.
    async fn with_profiles(&self, mut row: RawLessonRow) -> RawLessonRow {
        let profiles = self.profiles.read().await;
        let lookup = |id: &Option<String>| {
            let id = id.as_deref()?;
            let p = profiles.get(id)?;
            Some(serde_json::json!({ "id": id, "full_name": p.full_name }))
        };
        if row.profile.is_none() {
            row.profile = lookup(&row.student_id);
        }
        if row.teacher_profile.is_none() {
            row.teacher_profile = lookup(&row.teacher_id);
        }
        row
    }
}

fn has_owners(row: &RawLessonRow) -> bool {
    row.student_id.is_some() && row.teacher_id.is_some()
}

fn apply_patch(row: &mut RawLessonRow, patch: &LessonPatch) {
    if let Some(v) = patch.lesson_number {
        row.lesson_number = v.map(i64::from);
    }
    if let Some(v) = &patch.title {
        row.title = v.clone();
    }
    if let Some(v) = &patch.notes {
        row.notes = v.clone();
    }
    if let Some(v) = patch.date {
        row.date = v.map(|d| d.format("%Y-%m-%d").to_string());
    }
    if let Some(v) = &patch.time {
        row.time = v.clone();
    }
    if let Some(s) = patch.status {
        row.status = Some(s.as_str().to_string());
    }
    row.updated_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
}

fn row_matches(row: &RawLessonRow, filter: &ListFilter) -> bool {
    if let Some(user) = filter.user_id.as_deref() {
        let is_party =
            row.student_id.as_deref() == Some(user) || row.teacher_id.as_deref() == Some(user);
        if !is_party {
            return false;
        }
    }
    if let Some(student) = filter.student_id.as_deref() {
        if row.student_id.as_deref() != Some(student) {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if row.status.as_deref() != Some(status.as_str()) {
            return false;
        }
    }
    true
}

// Missing or unparseable sort keys go last in either direction.
fn compare(a: &RawLessonRow, b: &RawLessonRow, key: SortKey, order: SortOrder) -> Ordering {
    fn directed<T: Ord>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => match order {
                SortOrder::Asc => a.cmp(&b),
                SortOrder::Desc => b.cmp(&a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
    match key {
        SortKey::Date => directed(
            a.date.as_deref().and_then(parse_date),
            b.date.as_deref().and_then(parse_date),
            order,
        ),
        SortKey::LessonNumber => directed(a.lesson_number, b.lesson_number, order),
        SortKey::CreatedAt => directed(
            a.created_at.as_deref().and_then(parse_timestamp),
            b.created_at.as_deref().and_then(parse_timestamp),
            order,
        ),
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.check_up()
    }

    async fn update_lesson(&self, id: &str, patch: &LessonPatch) -> StoreResult<LessonRecord> {
        self.check_writable(id).await?;
        let updated = {
            let mut lessons = self.lessons.write().await;
            // rows without both owners are invisible to reads, so writes skip them too
            let row = lessons
                .iter_mut()
                .find(|r| r.id.as_deref() == Some(id) && has_owners(r))
                .ok_or(StoreError::NotFound)?;
            apply_patch(row, patch);
            row.clone()
        };
        let row = self.with_profiles(updated).await;
        reconcile_row(&row, Utc::now())
            .into_record()
            .ok_or_else(|| StoreError::Malformed(format!("lesson {id} lost its owners")))
    }

    async fn delete_lesson(&self, id: &str) -> StoreResult<String> {
        self.check_writable(id).await?;
        let mut lessons = self.lessons.write().await;
        let pos = lessons
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
            .ok_or(StoreError::NotFound)?;
        lessons.remove(pos);
        Ok(id.to_string())
    }

    async fn list_lessons(&self, filter: &ListFilter) -> StoreResult<Vec<RawLessonRow>> {
        self.check_up()?;
        let mut rows: Vec<RawLessonRow> = self
            .lessons
            .read()
            .await
            .iter()
            .filter(|r| row_matches(r, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare(a, b, filter.sort, filter.order));

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.with_profiles(row).await);
        }
        Ok(out)
    }
}

#[async_trait]
impl ProfileDirectory for MemoryStore {
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<String>> {
        self.check_up()?;
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn role_of(&self, user_id: &str) -> StoreResult<Option<Role>> {
        self.check_up()?;
        Ok(self
            .profiles
            .read()
            .await
            .get(user_id)
            .and_then(|p| p.role))
    }
}
