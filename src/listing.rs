use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{e400, ApiError};
use crate::models::{
    LessonRecord, LessonStatus, ListFilter, ListLessonsQuery, RawLessonRow, SortKey, SortOrder,
};
use crate::validation::{reconcile_row, RowVerdict};

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_list_query(q: &ListLessonsQuery) -> Result<ListFilter, ApiError> {
    let student_id = match present(&q.student_id) {
        None => None,
        Some(s) => Some(
            Uuid::parse_str(s)
                .map_err(|_| e400("Invalid student ID format"))?
                .to_string(),
        ),
    };

    let status = match present(&q.filter) {
        None => None,
        Some(s) => Some(LessonStatus::parse(s).ok_or_else(|| e400("Invalid status filter"))?),
    };

    let sort = match present(&q.sort) {
        None => SortKey::default(),
        Some("date") => SortKey::Date,
        Some("lesson_number") => SortKey::LessonNumber,
        Some("created_at") => SortKey::CreatedAt,
        Some(_) => return Err(e400("Invalid sort parameter")),
    };

    let order = match present(&q.order) {
        None => SortOrder::default(),
        Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
        Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
        Some(_) => return Err(e400("Invalid sort parameter")),
    };

    Ok(ListFilter {
        user_id: present(&q.user_id).map(str::to_string),
        student_id,
        status,
        sort,
        order,
    })
}

/// Turns raw rows into the best list that can be served. Rows keep the order the store
/// returned them in; rows without an id, student or teacher are left out.
// NOTE: dropped rows are only logged, unlike batch writes which report every failure.
// Clients relying on that silence would need a per-row error channel before it changes.
pub fn reconcile(rows: Vec<RawLessonRow>, now: DateTime<Utc>) -> Vec<LessonRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match reconcile_row(row, now) {
            RowVerdict::Valid(record) => out.push(record),
            RowVerdict::Reconstructed { record, defects } => {
                tracing::debug!(index, id = %record.id, ?defects, "lesson row reconstructed");
                out.push(record);
            }
            RowVerdict::Dropped { missing } => {
                tracing::warn!(index, id = ?row.id, ?missing, "lesson row dropped");
            }
        }
    }
    out
}
