//! Shared error handling for API endpoints.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error};
use validator::{Validate, ValidationErrors};

use crate::auth::AuthError;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
    fn internal_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
    fn internal_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::internal_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn internal_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Internal server error".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated(msg) => Self::Unauthorized(msg.into()),
            AuthError::Forbidden(msg) => Self::Forbidden(msg.into()),
            AuthError::Internal => Self::Internal("Internal server error".into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(status = %rejection.status(), "Rejected request body");
        Self::BadRequest(rejection.body_text())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::BadRequest(first_validation_message(&errors))
    }
}

/// Message of the first failing field, taking fields in name order.
fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    for (field, errs) in fields {
        if let Some(e) = errs.first() {
            return match &e.message {
                Some(message) => message.to_string(),
                None => format!("Invalid {}", field),
            };
        }
    }
    "Invalid request body".to_string()
}

/// `Json` whose rejections answer 400 with the usual error body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// [`ApiJson`] followed by the body's `validator` rules.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::Internal(msg) => msg,
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Parse a numeric path ID.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {} ID", what)))
}

/// True if the error is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http, routing::post};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address"))]
        email: String,
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    fn app() -> Router {
        Router::new()
            .route("/plain", post(|ApiJson(s): ApiJson<Signup>| async move { s.name }))
            .route(
                "/validated",
                post(|ValidatedJson(s): ValidatedJson<Signup>| async move { s.name }),
            )
    }

    async fn post_to(uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, String) {
        let mut builder = http::Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }
        let response = app()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
        (status, json["error"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn test_body_rejections_are_json_400() {
        let json = Some("application/json");

        let (status, error) = post_to("/plain", json, r#"{"email":"a@b.co"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.contains("missing field `name`"), "{}", error);

        let (status, error) = post_to("/plain", json, r#"{"email":"a@b.co","name":5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.contains("invalid type"), "{}", error);

        let (status, error) = post_to("/plain", json, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!error.is_empty());

        let (status, error) = post_to("/plain", None, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.contains("Content-Type"), "{}", error);
    }

    #[tokio::test]
    async fn test_validated_json() {
        let json = Some("application/json");

        let (status, _) = post_to("/validated", json, r#"{"email":"a@b.co","name":"A"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) =
            post_to("/validated", json, r#"{"email":"nope","name":"A"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error, "Invalid email address");

        // Both fields fail; the message is stable
        let (_, error) = post_to("/validated", json, r#"{"email":"nope","name":""}"#).await;
        assert_eq!(error, "Invalid email address");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("7", "task").unwrap(), 7);
        for raw in ["0", "-1", "abc", ""] {
            match parse_id(raw, "task") {
                Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "Invalid task ID"),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
