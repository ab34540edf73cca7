use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("validation failed on {} field(s)", .0.len())]
    Validation(BTreeMap<String, String>),

    /// The job store could not be reached or answered with an error.
    #[error("job data unavailable: {0}")]
    DataUnavailable(#[from] sqlx::Error),
}

impl ApiError {
    pub fn job_not_found(id: Uuid) -> Self {
        ApiError::NotFound(format!("Job not found with id: {id}"))
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(BTreeMap::from([(field.to_string(), message.into())]))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid("id", rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match self {
            ApiError::NotFound(message) => (message, None),
            ApiError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            ApiError::DataUnavailable(err) => {
                tracing::error!("job store unavailable: {err}");
                ("Job data is temporarily unavailable".to_string(), None)
            }
        };
        let body = ErrorBody {
            status: status.as_u16(),
            message,
            timestamp: Utc::now(),
            errors,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_http_status() {
        assert_eq!(
            ApiError::job_not_found(Uuid::nil()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Validation(BTreeMap::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DataUnavailable(sqlx::Error::PoolTimedOut).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn invalid_names_a_single_field() {
        match ApiError::invalid("id", "not a uuid") {
            ApiError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors["id"], "not a uuid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn not_found_message_names_the_job() {
        let err = ApiError::job_not_found(Uuid::nil());
        assert_eq!(
            err.to_string(),
            "Job not found with id: 00000000-0000-0000-0000-000000000000"
        );
    }
}
