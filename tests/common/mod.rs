#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use lessons_admin::{auth::Role, memory::MemoryStore, models::RawLessonRow, AppState};

pub const TEACHER_TOKEN: &str = "teacher-token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const STUDENT_TOKEN: &str = "student-token";

pub const STUDENT: &str = "5b0f4a52-8a7e-4a8c-9a0b-2b9a4f9e1c01";
pub const TEACHER: &str = "0c7e2d7a-6f3b-4f0e-b1d2-7e5a3c9b8d02";
pub const ADMIN: &str = "9a1b2c3d-4e5f-4a6b-8c7d-0e1f2a3b4c5d";

/// Memory store with one teacher, one admin and one student, each with a session.
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new_shared();
    store.add_profile(TEACHER, Some(Role::Teacher), Some("Clara Wieck")).await;
    store.add_profile(ADMIN, Some(Role::Admin), None).await;
    store.add_profile(STUDENT, Some(Role::Student), Some("Felix M.")).await;
    store.add_session(TEACHER_TOKEN, TEACHER).await;
    store.add_session(ADMIN_TOKEN, ADMIN).await;
    store.add_session(STUDENT_TOKEN, STUDENT).await;
    store
}

pub fn app(store: Arc<MemoryStore>) -> Router {
    lessons_admin::app(AppState::new(store), 1024 * 1024)
}

pub fn app_with_concurrency(store: Arc<MemoryStore>, n: usize) -> Router {
    lessons_admin::app(AppState::new(store).with_batch_concurrency(n), 1024 * 1024)
}

pub fn lesson(id: &str) -> RawLessonRow {
    RawLessonRow {
        id: Some(id.to_string()),
        student_id: Some(STUDENT.to_string()),
        teacher_id: Some(TEACHER.to_string()),
        status: Some("SCHEDULED".to_string()),
        created_at: Some("2024-05-01T09:00:00Z".to_string()),
        updated_at: Some("2024-05-01T09:00:00Z".to_string()),
        ..Default::default()
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

pub fn assert_outcome_invariant(body: &Value, items_key: &str) {
    let total = body["total"].as_u64().unwrap();
    let success = body["success"].as_u64().unwrap();
    let failed = body["failed"].as_u64().unwrap();
    assert_eq!(total, success + failed, "total != success + failed: {body}");
    assert_eq!(body[items_key].as_array().unwrap().len() as u64, success);
    assert_eq!(body["errors"].as_array().unwrap().len() as u64, failed);
}
