mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;
use lessons_admin::models::RawLessonRow;

#[tokio::test]
async fn applies_partial_updates_and_returns_records() {
    let store = seeded_store().await;
    store.insert_row(lesson("l-1")).await;
    store.insert_row(lesson("l-2")).await;
    let app = app(store.clone());

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [
            { "id": "l-1", "status": "COMPLETED", "notes": "Worked on pedalling" },
            { "id": "l-2", "date": "2024-06-03", "time": "16:45" }
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], 2);
    let updated = body["updated"].as_array().unwrap();
    assert_eq!(updated[0]["id"], "l-1");
    assert_eq!(updated[0]["status"], "COMPLETED");
    assert_eq!(updated[0]["notes"], "Worked on pedalling");
    assert_eq!(updated[0]["teacher_profile"]["full_name"], "Clara Wieck");
    assert_eq!(updated[1]["date"], "2024-06-03");
    assert_eq!(updated[1]["time"], "16:45");
    assert_eq!(updated[1]["status"], "SCHEDULED");

    let row = store.row("l-1").await.unwrap();
    assert_eq!(row.status.as_deref(), Some("COMPLETED"));
    assert_outcome_invariant(&body, "updated");
}

#[tokio::test]
async fn invalid_status_fails_only_its_item() {
    let store = seeded_store().await;
    store.insert_row(lesson("l-1")).await;
    store.insert_row(lesson("l-2")).await;
    let app = app(store.clone());

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [
            { "id": "l-1", "status": "FINISHED" },
            { "id": "l-2", "title": "Chopin op. 28" }
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["success"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["errors"][0]["id"], "l-1");
    assert_eq!(body["errors"][0]["error"], "Validation failed");
    assert_eq!(body["errors"][0]["details"][0]["field"], "status");
    assert_eq!(body["updated"][0]["title"], "Chopin op. 28");

    // rejected item left untouched
    let row = store.row("l-1").await.unwrap();
    assert_eq!(row.status.as_deref(), Some("SCHEDULED"));
    assert_outcome_invariant(&body, "updated");
}

#[tokio::test]
async fn single_invalid_item_outcome() {
    let store = seeded_store().await;
    store.insert_row(lesson("l-1")).await;
    let app = app(store);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [{ "id": "l-1", "status": 3 }] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["success"], 0);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["errors"][0]["error"], "Validation failed");
}

#[tokio::test]
async fn ownerless_lesson_fails_without_being_written() {
    let store = seeded_store().await;
    store
        .insert_row(RawLessonRow {
            student_id: None,
            ..lesson("l-1")
        })
        .await;
    store.insert_row(lesson("l-2")).await;
    let app = app(store.clone());

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [
            { "id": "l-1", "status": "CANCELLED", "title": "changed" },
            { "id": "l-2", "title": "changed" }
        ]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], 1);
    assert_eq!(body["errors"][0]["id"], "l-1");
    assert_eq!(body["errors"][0]["error"], "Lesson not found");

    let row = store.row("l-1").await.unwrap();
    assert_eq!(row.status.as_deref(), Some("SCHEDULED"));
    assert_eq!(row.title, None);
    assert_outcome_invariant(&body, "updated");
}

#[tokio::test]
async fn missing_id_is_reported_before_field_checks() {
    let store = seeded_store().await;
    let app = app(store);

    let (_, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [{ "status": "NOT_A_STATUS" }, "junk"] })),
    )
    .await;

    assert_eq!(body["failed"], 2);
    for e in body["errors"].as_array().unwrap() {
        assert_eq!(e["error"], "Lesson ID is required");
        assert!(e.get("details").is_none());
    }
}

#[tokio::test]
async fn concurrent_dispatch_keeps_input_order() {
    let store = seeded_store().await;
    let mut updates = Vec::new();
    for i in 0..40 {
        let id = format!("l-{i}");
        if i % 3 != 0 {
            store.insert_row(lesson(&id)).await;
        }
        if i % 7 == 0 {
            store.fail_on(&id).await;
        }
        updates.push(json!({ "id": id, "lesson_number": i }));
    }
    let app = app_with_concurrency(store, 8);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(ADMIN_TOKEN),
        Some(json!({ "updates": updates })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_outcome_invariant(&body, "updated");

    let numbers: Vec<u64> = body["updated"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["lesson_number"].as_u64().unwrap())
        .collect();
    let mut sorted = numbers.clone();
    sorted.sort();
    assert_eq!(numbers, sorted);

    let indexes: Vec<u64> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["index"].as_u64().unwrap())
        .collect();
    let mut sorted = indexes.clone();
    sorted.sort();
    assert_eq!(indexes, sorted);
    assert_eq!(
        body["total"].as_u64().unwrap(),
        (numbers.len() + indexes.len()) as u64
    );
}

#[tokio::test]
async fn empty_and_oversized_updates_are_rejected_whole() {
    let store = seeded_store().await;
    let app = app(store);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Lesson updates array is required and cannot be empty");

    let updates: Vec<_> = (0..101).map(|i| json!({ "id": format!("l-{i}") })).collect();
    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(TEACHER_TOKEN),
        Some(json!({ "updates": updates })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot update more than 100 lessons at once");
}

#[tokio::test]
async fn batch_endpoints_require_staff() {
    let store = seeded_store().await;
    store.insert_row(lesson("l-1")).await;
    let app = app(store.clone());
    let payload = json!({ "updates": [{ "id": "l-1", "title": "x" }] });

    let (status, _) = send(&app, "PUT", "/api/lessons/bulk", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some("stale-token"),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/lessons/bulk",
        Some(STUDENT_TOKEN),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(store.row("l-1").await.unwrap().title, None);

    // auth runs before shape checks
    let (status, _) = send(
        &app,
        "DELETE",
        "/api/lessons/bulk",
        Some(STUDENT_TOKEN),
        Some(json!({ "lessonIds": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
