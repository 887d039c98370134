use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tally::BadgeError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Badge configuration error: {0}")]
    Badge(#[from] BadgeError),

    #[error("Database error: {0}")]
    Database(#[from] redis::RedisError),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Badge { .. } | AppError::Database { .. } | AppError::Corrupt { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally::CriterionKind;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::MalformedPayload("title".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("Question"), StatusCode::NOT_FOUND),
            (AppError::Conflict("User"), StatusCode::CONFLICT),
            (
                AppError::Badge(BadgeError::InvalidCriterion(CriterionKind::TotalViews)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(AppError::NotFound("Answer").to_string(), "Answer not found");
        assert_eq!(
            AppError::MalformedPayload("Title too short".into()).to_string(),
            "Malformed payload: Title too short"
        );
    }
}
