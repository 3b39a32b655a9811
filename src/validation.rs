// Record validation for both directions: batch write items and persisted rows on read.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{LessonPatch, LessonRecord, LessonStatus, ProfileRef, RawLessonRow};

pub const MSG_ID_REQUIRED: &str = "Lesson ID is required";
pub const MSG_VALIDATION_FAILED: &str = "Validation failed";

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Per-item failure carried inside a batch outcome. `id` is null when the item had no
/// usable id; `index` is always the item's position in the request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ItemError {
    pub id: Option<String>,
    pub index: usize,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
}

impl ItemError {
    pub fn new(index: usize, id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            id,
            index,
            error: error.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpdate {
    pub id: String,
    pub patch: LessonPatch,
}

/// Pulls a non-empty id out of `v`. On failure returns what should be reported as the
/// item's id: the raw string when there was one (even if blank), otherwise nothing.
fn require_id(v: Option<&Value>) -> Result<String, Option<String>> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(s)) => Err(Some(s.clone())),
        _ => Err(None),
    }
}

pub fn validate_delete_item(index: usize, item: &Value) -> Result<String, ItemError> {
    require_id(Some(item)).map_err(|id| ItemError::new(index, id, MSG_ID_REQUIRED))
}

pub fn validate_update_item(index: usize, item: &Value) -> Result<ValidatedUpdate, ItemError> {
    let empty = Map::new();
    let obj = item.as_object().unwrap_or(&empty);

    // id first; nothing else is looked at until it is present
    let id = require_id(obj.get("id")).map_err(|id| ItemError::new(index, id, MSG_ID_REQUIRED))?;

    let mut issues = Vec::new();
    let mut patch = LessonPatch::default();

    if let Some(v) = obj.get("title") {
        patch.title = nullable_text(v, "title", &mut issues);
    }
    if let Some(v) = obj.get("notes") {
        patch.notes = nullable_text(v, "notes", &mut issues);
    }
    if let Some(v) = obj.get("date") {
        patch.date = match v {
            Value::Null => Some(None),
            Value::String(s) if s.is_empty() => Some(None),
            Value::String(s) => match parse_date(s) {
                Some(d) => Some(Some(d)),
                None => {
                    issues.push(issue("date", "expected a calendar date (YYYY-MM-DD)"));
                    None
                }
            },
            _ => {
                issues.push(issue("date", "expected a string"));
                None
            }
        };
    }
    if let Some(v) = obj.get("time") {
        patch.time = match v {
            Value::Null => Some(None),
            Value::String(s) if s.is_empty() => Some(None),
            Value::String(s) if parse_time(s).is_some() => Some(Some(s.clone())),
            Value::String(_) => {
                issues.push(issue("time", "expected a time of day (HH:MM or HH:MM:SS)"));
                None
            }
            _ => {
                issues.push(issue("time", "expected a string"));
                None
            }
        };
    }
    if let Some(v) = obj.get("status") {
        match v.as_str().and_then(LessonStatus::parse) {
            Some(s) => patch.status = Some(s),
            None => issues.push(issue(
                "status",
                "expected one of SCHEDULED, IN_PROGRESS, COMPLETED, CANCELLED, RESCHEDULED",
            )),
        }
    }
    if let Some(v) = obj.get("lesson_number") {
        patch.lesson_number = match v {
            Value::Null => Some(None),
            _ => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
                Some(n) => Some(Some(n)),
                None => {
                    issues.push(issue("lesson_number", "expected a non-negative integer"));
                    None
                }
            },
        };
    }

    if !issues.is_empty() {
        return Err(ItemError {
            id: Some(id),
            index,
            error: MSG_VALIDATION_FAILED.into(),
            details: Some(issues),
        });
    }
    Ok(ValidatedUpdate { id, patch })
}

fn nullable_text(v: &Value, field: &str, issues: &mut Vec<FieldIssue>) -> Option<Option<String>> {
    match v {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        _ => {
            issues.push(issue(field, "expected a string"));
            None
        }
    }
}

fn issue(field: &str, message: &str) -> FieldIssue {
    FieldIssue {
        field: field.into(),
        message: message.into(),
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Accepts RFC 3339 as well as the Postgres text rendering of `timestamptz`
/// (`2024-05-01 10:00:00.123+00`). Naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|t| t.and_utc())
}

// --- read path ---

/// What happened to one persisted row on its way into a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum RowVerdict {
    /// Every field passed the full schema.
    Valid(LessonRecord),
    /// Identity was intact but some fields were malformed and got defaults.
    Reconstructed {
        record: LessonRecord,
        defects: Vec<&'static str>,
    },
    /// One or more of id, student_id, teacher_id was missing. Cannot be repaired.
    Dropped { missing: Vec<&'static str> },
}

impl RowVerdict {
    pub fn into_record(self) -> Option<LessonRecord> {
        match self {
            RowVerdict::Valid(r) => Some(r),
            RowVerdict::Reconstructed { record, .. } => Some(record),
            RowVerdict::Dropped { .. } => None,
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.trim().is_empty())
}

/// Checks a row against the full lesson schema and salvages what it can. Malformed
/// optional fields fall back to their defaults; timestamps fall back to `now`.
pub fn reconcile_row(row: &RawLessonRow, now: DateTime<Utc>) -> RowVerdict {
    let (id, student_id, teacher_id) = match (
        non_empty(&row.id),
        non_empty(&row.student_id),
        non_empty(&row.teacher_id),
    ) {
        (Some(a), Some(b), Some(c)) => (a.to_string(), b.to_string(), c.to_string()),
        (a, b, c) => {
            let missing = [("id", a), ("student_id", b), ("teacher_id", c)]
                .into_iter()
                .filter(|(_, v)| v.is_none())
                .map(|(name, _)| name)
                .collect();
            return RowVerdict::Dropped { missing };
        }
    };

    let mut defects = Vec::new();

    let lesson_number = match row.lesson_number {
        None => None,
        Some(n) => match u32::try_from(n) {
            Ok(n) => Some(n),
            Err(_) => {
                defects.push("lesson_number");
                None
            }
        },
    };

    let date = match non_empty(&row.date) {
        None => None,
        Some(s) => {
            // `date` columns may come back as a full timestamp; keep the day
            let parsed = parse_date(s).or_else(|| parse_timestamp(s).map(|t| t.date_naive()));
            if parsed.is_none() {
                defects.push("date");
            }
            parsed
        }
    };

    let time = match non_empty(&row.time) {
        None => None,
        Some(s) if parse_time(s).is_some() => Some(s.to_string()),
        Some(_) => {
            defects.push("time");
            None
        }
    };

    let status = match row.status.as_deref() {
        None => LessonStatus::default(),
        Some(s) => LessonStatus::parse(s).unwrap_or_else(|| {
            defects.push("status");
            LessonStatus::default()
        }),
    };

    let mut timestamp = |v: &Option<String>, field: &'static str| {
        match v.as_deref().and_then(parse_timestamp) {
            Some(t) => t,
            None => {
                defects.push(field);
                now
            }
        }
    };
    let created_at = timestamp(&row.created_at, "created_at");
    let updated_at = timestamp(&row.updated_at, "updated_at");

    let profile = profile_ref(&row.profile, "profile", &mut defects);
    let teacher_profile = profile_ref(&row.teacher_profile, "teacher_profile", &mut defects);

    let record = LessonRecord {
        id,
        student_id,
        teacher_id,
        lesson_number,
        title: row.title.clone(),
        notes: row.notes.clone(),
        date,
        time,
        status,
        created_at,
        updated_at,
        profile,
        teacher_profile,
    };

    if defects.is_empty() {
        RowVerdict::Valid(record)
    } else {
        RowVerdict::Reconstructed { record, defects }
    }
}

fn profile_ref(
    v: &Option<Value>,
    field: &'static str,
    defects: &mut Vec<&'static str>,
) -> Option<ProfileRef> {
    match v {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value::<ProfileRef>(v.clone()) {
            Ok(p) => Some(p),
            Err(_) => {
                defects.push(field);
                None
            }
        },
    }
}
