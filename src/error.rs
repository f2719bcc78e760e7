use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use log::error;
use rusqlite::ErrorCode;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Database(rusqlite::Error),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_data"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        (status, Json(json!({
            "status": "error",
            "errorType": error_type,
            "error": self.to_string()
        }))).into_response()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("no matching record".to_string()),
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Self::BadRequest(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => Self::Database(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_maps_to_not_found() {
        let err = AppError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn constraint_violation_maps_to_bad_request() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (k TEXT PRIMARY KEY)", []).unwrap();
        conn.execute("INSERT INTO t (k) VALUES ('a')", []).unwrap();
        let err = conn.execute("INSERT INTO t (k) VALUES ('a')", []).unwrap_err();

        let err = AppError::from(err);
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
