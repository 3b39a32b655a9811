use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::Role;
use crate::error::StoreError;
use crate::models::{LessonPatch, LessonRecord, ListFilter, RawLessonRow, SortOrder};
use crate::store::{LessonStore, ProfileDirectory, StoreResult};
use crate::validation::reconcile_row;

pub type Db = Pool<Postgres>;

pub async fn connect(url: &str) -> Result<Db> {
    Pool::<Postgres>::connect(url)
        .await
        .context("failed to connect to DATABASE_URL")
}

// Every column comes back as loosely typed text so a bad row decodes instead of
// failing the whole result set.
const LESSON_COLUMNS: &str = r#"
    l.id::text AS id,
    l.student_id::text AS student_id,
    l.teacher_id::text AS teacher_id,
    l.lesson_number::bigint AS lesson_number,
    l.title,
    l.notes,
    l."date"::text AS date,
    l."time" AS time,
    l.status,
    l.created_at::text AS created_at,
    l.updated_at::text AS updated_at,
    CASE WHEN sp.id IS NULL THEN NULL
         ELSE json_build_object('id', sp.id::text, 'full_name', sp.full_name, 'email', sp.email)
    END AS profile,
    CASE WHEN tp.id IS NULL THEN NULL
         ELSE json_build_object('id', tp.id::text, 'full_name', tp.full_name, 'email', tp.email)
    END AS teacher_profile
"#;

const PROFILE_JOINS: &str = r#"
    LEFT JOIN profiles sp ON sp.id = l.student_id
    LEFT JOIN profiles tp ON tp.id = l.teacher_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

// Ids are uuids in the schema; anything else cannot name an existing lesson.
fn lesson_uuid(id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::NotFound)
}

#[async_trait]
impl LessonStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn update_lesson(&self, id: &str, patch: &LessonPatch) -> StoreResult<LessonRecord> {
        let lesson_id = lesson_uuid(id)?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "WITH l AS (UPDATE lessons SET updated_at = now()",
        );
        if let Some(v) = patch.lesson_number {
            qb.push(", lesson_number = ").push_bind(v.map(i64::from));
        }
        if let Some(v) = &patch.title {
            qb.push(", title = ").push_bind(v.clone());
        }
        if let Some(v) = &patch.notes {
            qb.push(", notes = ").push_bind(v.clone());
        }
        if let Some(v) = patch.date {
            qb.push(", \"date\" = ").push_bind(v);
        }
        if let Some(v) = &patch.time {
            qb.push(", \"time\" = ").push_bind(v.clone());
        }
        if let Some(s) = patch.status {
            qb.push(", status = ").push_bind(s.as_str());
        }
        qb.push(" WHERE id = ")
            .push_bind(lesson_id)
            .push(" AND student_id IS NOT NULL AND teacher_id IS NOT NULL")
            .push(" RETURNING *) SELECT ")
            .push(LESSON_COLUMNS)
            .push(" FROM l ")
            .push(PROFILE_JOINS);

        let row = qb
            .build_query_as::<RawLessonRow>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        reconcile_row(&row, Utc::now())
            .into_record()
            .ok_or_else(|| StoreError::Malformed(format!("lesson {id} lost its owners")))
    }

    async fn delete_lesson(&self, id: &str) -> StoreResult<String> {
        let lesson_id = lesson_uuid(id)?;
        let res = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(lesson_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(id.to_string())
    }

    async fn list_lessons(&self, filter: &ListFilter) -> StoreResult<Vec<RawLessonRow>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(LESSON_COLUMNS)
            .push(" FROM lessons l ")
            .push(PROFILE_JOINS)
            .push(" WHERE TRUE");

        if let Some(user) = filter.user_id.as_deref() {
            qb.push(" AND (l.student_id::text = ")
                .push_bind(user)
                .push(" OR l.teacher_id::text = ")
                .push_bind(user)
                .push(")");
        }
        if let Some(student) = filter.student_id.as_deref() {
            qb.push(" AND l.student_id::text = ").push_bind(student);
        }
        if let Some(status) = filter.status {
            qb.push(" AND l.status = ").push_bind(status.as_str());
        }

        let dir = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY l.\"{}\" {} NULLS LAST, l.id",
            filter.sort.column(),
            dir
        ));

        Ok(qb.build_query_as::<RawLessonRow>().fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl ProfileDirectory for PgStore {
    async fn resolve_session(&self, token: &str) -> StoreResult<Option<String>> {
        let user = sqlx::query_scalar::<_, String>(
            r#"SELECT user_id::text FROM sessions
               WHERE token = $1 AND (expires_at IS NULL OR expires_at > now())"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn role_of(&self, user_id: &str) -> StoreResult<Option<Role>> {
        let role = sqlx::query_scalar::<_, Option<String>>(
            "SELECT role FROM profiles WHERE id::text = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();
        Ok(role.as_deref().and_then(Role::parse))
    }
}
