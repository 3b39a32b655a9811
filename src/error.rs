use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Whole-request failures. Anything raised here rejects the request before or instead of
/// any per-item work; per-item problems live in `batch::ItemError`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication required")]
    Authentication,
    #[error("Forbidden")]
    Authorization,
    #[error("{0}")]
    RequestShape(String),
    #[error("{0}")]
    Infrastructure(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Authentication => StatusCode::UNAUTHORIZED,
            ApiError::Authorization => StatusCode::FORBIDDEN,
            ApiError::RequestShape(_) => StatusCode::BAD_REQUEST,
            ApiError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Errors reported by a persistence adapter for a single call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Lesson not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("stored lesson is malformed: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.constraint().is_some() => {
                StoreError::Constraint(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

// --- helpers ---
pub fn e400<T: Into<String>>(msg: T) -> ApiError {
    ApiError::RequestShape(msg.into())
}

pub fn e500<E: std::fmt::Display>(e: E) -> ApiError {
    tracing::error!(error=%e, "internal error");
    ApiError::Infrastructure("Internal server error".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(ApiError::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Authorization.status(), StatusCode::FORBIDDEN);
        assert_eq!(e400("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(e500("boom").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn infrastructure_message_hides_source() {
        let err = e500("password=hunter2 connection refused");
        assert_eq!(err.to_string(), "Internal server error");
    }
}
