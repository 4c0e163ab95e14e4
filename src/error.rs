use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::users::validation::ValidationErrors;

/// Failures of a single user operation. None of them are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("user {0} not found")]
    NotFound(Uuid),
    #[error("no user with email {0}")]
    EmailNotFound(String),
    /// The body was not a JSON object at all.
    #[error("invalid request body: {1}")]
    InvalidBody(StatusCode, String),
    #[error("user store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UserError::NotFound(_) | UserError::EmailNotFound(_) => StatusCode::NOT_FOUND,
            UserError::InvalidBody(status, _) => *status,
            UserError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UserError::ValidationFailed(_) => "validation_failed",
            UserError::NotFound(_) | UserError::EmailNotFound(_) => "not_found",
            UserError::InvalidBody(..) => "invalid_body",
            UserError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<JsonRejection> for UserError {
    fn from(rejection: JsonRejection) -> Self {
        UserError::InvalidBody(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            UserError::ValidationFailed(errs) => json!({
                "error": self.code(),
                "message": "Invalid user data",
                "fields": errs,
            }),
            // store details stay in the logs
            UserError::StoreUnavailable(_) => json!({
                "error": self.code(),
                "message": "User store is unavailable, try again later",
            }),
            _ => json!({
                "error": self.code(),
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_status_codes() {
        let nf = UserError::NotFound(Uuid::nil());
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);
        assert_eq!(nf.code(), "not_found");

        let su = UserError::StoreUnavailable(anyhow::anyhow!("connection refused"));
        assert_eq!(su.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(su.to_string(), "user store unavailable");

        let vf = UserError::ValidationFailed(ValidationErrors::default());
        assert_eq!(vf.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let en = UserError::EmailNotFound("ada@example.com".into());
        assert_eq!(en.status(), StatusCode::NOT_FOUND);
        assert_eq!(en.code(), "not_found");

        let ib = UserError::InvalidBody(StatusCode::UNSUPPORTED_MEDIA_TYPE, "no json".into());
        assert_eq!(ib.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ib.code(), "invalid_body");
    }

    #[test]
    fn store_error_keeps_its_source() {
        let err = UserError::StoreUnavailable(anyhow::anyhow!("connection refused"));
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "connection refused");
    }
}
