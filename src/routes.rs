use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::Utc;
use serde_json::Value;

use crate::{
    auth::{self, Identity, STAFF},
    batch::{self, BatchOp},
    error::{e400, e500, ApiError},
    listing,
    models::*,
    state::AppState,
};

type MaybeBearer = Option<TypedHeader<Authorization<Bearer>>>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready))
        // batch mutations
        .route("/api/lessons/bulk", put(bulk_update).delete(bulk_delete))
        // degraded listing
        .route("/api/lessons", get(list_lessons))
        .with_state(state)
}

async fn caller(state: &AppState, bearer: &MaybeBearer) -> Result<Identity, ApiError> {
    let token = bearer.as_ref().map(|TypedHeader(a)| a.token());
    auth::authenticate(token, state.directory.as_ref()).await
}

/// Runs the whole-request gates shared by both batch endpoints, in order:
/// auth, body shape, batch size, store reachability.
async fn open_batch<T>(
    state: &AppState,
    bearer: &MaybeBearer,
    op: BatchOp,
    body: Result<Json<T>, JsonRejection>,
    items: impl FnOnce(T) -> Option<Vec<Value>>,
) -> Result<Vec<Value>, ApiError> {
    let who = caller(state, bearer).await?;
    auth::authorize(&who, STAFF)?;

    let empty = || op.reject(batch::SizeError::Empty);
    let Json(body) = body.map_err(|e| {
        tracing::debug!(error = %e, "unreadable batch body");
        empty()
    })?;
    let items = items(body).ok_or_else(empty)?;
    batch::validate_batch_size(Some(items.as_slice())).map_err(|e| op.reject(e))?;

    state.lessons.ping().await.map_err(e500)?;
    tracing::info!(op = op.as_str(), user_id = %who.user_id, count = items.len(), "batch accepted");
    Ok(items)
}

async fn bulk_update(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    body: Result<Json<BulkUpdateReq>, JsonRejection>,
) -> Result<Json<BulkUpdateResp>, ApiError> {
    let items = open_batch(&state, &bearer, BatchOp::Update, body, |b| b.updates).await?;

    let outcome =
        batch::process_updates(state.lessons.as_ref(), &items, state.batch_concurrency).await;
    tracing::info!(
        op = "update",
        total = outcome.total,
        success = outcome.success,
        failed = outcome.failed,
        "batch finished"
    );
    Ok(Json(outcome.into_update_response()))
}

async fn bulk_delete(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    body: Result<Json<BulkDeleteReq>, JsonRejection>,
) -> Result<Json<BulkDeleteResp>, ApiError> {
    let items = open_batch(&state, &bearer, BatchOp::Delete, body, |b| b.lesson_ids).await?;

    let outcome =
        batch::process_deletes(state.lessons.as_ref(), &items, state.batch_concurrency).await;
    tracing::info!(
        op = "delete",
        total = outcome.total,
        success = outcome.success,
        failed = outcome.failed,
        "batch finished"
    );
    Ok(Json(outcome.into_delete_response()))
}

async fn list_lessons(
    State(state): State<AppState>,
    bearer: MaybeBearer,
    query: Result<Query<ListLessonsQuery>, QueryRejection>,
) -> Result<Json<LessonList>, ApiError> {
    caller(&state, &bearer).await?;

    let Query(q) = query.map_err(|e| e400(e.body_text()))?;
    let filter = listing::parse_list_query(&q)?;

    let rows = state.lessons.list_lessons(&filter).await.map_err(e500)?;
    let fetched = rows.len();
    let lessons = listing::reconcile(rows, Utc::now());
    tracing::debug!(fetched, returned = lessons.len(), "lessons listed");
    Ok(Json(LessonList { lessons }))
}

async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.lessons.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "not_ready" })),
            )
        }
    }
}
