use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::validation::ItemError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl LessonStatus {
    pub const ALL: [LessonStatus; 5] = [
        LessonStatus::Scheduled,
        LessonStatus::InProgress,
        LessonStatus::Completed,
        LessonStatus::Cancelled,
        LessonStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Scheduled => "SCHEDULED",
            LessonStatus::InProgress => "IN_PROGRESS",
            LessonStatus::Completed => "COMPLETED",
            LessonStatus::Cancelled => "CANCELLED",
            LessonStatus::Rescheduled => "RESCHEDULED",
        }
    }

    pub fn parse(v: &str) -> Option<LessonStatus> {
        Self::ALL.into_iter().find(|s| s.as_str() == v)
    }
}

/// Display copy of a profile row. Not owned by the lesson and never kept in sync.
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfileRef {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LessonRecord {
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    pub lesson_number: Option<u32>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub status: LessonStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub profile: Option<ProfileRef>,
    pub teacher_profile: Option<ProfileRef>,
}

/// A lesson row as the store hands it back: every column optional and loosely typed,
/// so one bad row can be reconciled on its own instead of failing the whole decode.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawLessonRow {
    pub id: Option<String>,
    pub student_id: Option<String>,
    pub teacher_id: Option<String>,
    pub lesson_number: Option<i64>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub profile: Option<serde_json::Value>,
    pub teacher_profile: Option<serde_json::Value>,
}

/// Fields a batch update may touch. The outer `Option` is presence in the payload,
/// the inner one distinguishes an explicit `null` (clear) from a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonPatch {
    pub lesson_number: Option<Option<u32>>,
    pub title: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub date: Option<Option<NaiveDate>>,
    pub time: Option<Option<String>>,
    pub status: Option<LessonStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Date,
    LessonNumber,
    #[default]
    CreatedAt,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::LessonNumber => "lesson_number",
            SortKey::CreatedAt => "created_at",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Validated listing parameters handed to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub user_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<LessonStatus>,
    pub sort: SortKey,
    pub order: SortOrder,
}

// --- request bodies ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BulkUpdateReq {
    #[serde(default)]
    pub updates: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReq {
    #[serde(default)]
    pub lesson_ids: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListLessonsQuery {
    pub user_id: Option<String>,
    pub student_id: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LessonList {
    pub lessons: Vec<LessonRecord>,
}

// --- response bodies ---

/// Counters and per-item errors shared by both batch responses.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<ItemError>,
}

#[derive(Serialize, Debug, Clone)]
pub struct BulkUpdateResp {
    pub updated: Vec<LessonRecord>,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

#[derive(Serialize, Debug, Clone)]
pub struct BulkDeleteResp {
    pub deleted: Vec<String>,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for s in LessonStatus::ALL {
            let json = serde_json::to_value(s).unwrap();
            assert_eq!(json, serde_json::json!(s.as_str()));
            assert_eq!(LessonStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(LessonStatus::parse("scheduled"), None);
        assert_eq!(LessonStatus::default(), LessonStatus::Scheduled);
    }

    #[test]
    fn record_omits_absent_optionals() {
        let rec = LessonRecord {
            id: "l1".into(),
            student_id: "s1".into(),
            teacher_id: "t1".into(),
            lesson_number: None,
            title: None,
            notes: None,
            date: None,
            time: None,
            status: LessonStatus::Scheduled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            profile: None,
            teacher_profile: None,
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert!(v.get("title").is_none());
        assert!(v.get("profile").is_none());
        assert_eq!(v["status"], "SCHEDULED");
    }
}
