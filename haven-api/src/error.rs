/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; library errors convert into [`ApiError`]
/// with `?`, which renders as a JSON body of the form
/// `{ "error": "...", "message": "...", "details": [...] }`.
///
/// Token failures of every kind share one 401 body, and a todo that does not
/// exist looks exactly like one belonging to someone else.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use haven_shared::auth::jwt::JwtError;
use haven_shared::auth::middleware::UNAUTHORIZED_MESSAGE;
use haven_shared::auth::password::PasswordError;
use haven_shared::db::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (400)
    BadRequest(String),

    /// Authentication failed (401); the message is always generic
    Unauthorized,

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. a taken tenant slug
    Conflict(String),

    /// Field-level validation failures (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500); the message is logged, never returned
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. "not_found"
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// One-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                UNAUTHORIZED_MESSAGE.to_string(),
                None,
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", capitalize(what))),
            StoreError::Conflict { constraint } => ApiError::Conflict(conflict_message(&constraint)),
            StoreError::Validation { field, message } => ApiError::invalid(field, message),
            StoreError::Timeout(deadline) => {
                tracing::warn!(deadline_ms = deadline.as_millis(), "Database operation timed out");
                ApiError::ServiceUnavailable("The database did not respond in time".to_string())
            }
            StoreError::PolicyViolation(source) => {
                // A handler tried to write outside its tenant: a bug, not a client error
                tracing::error!(error = %source, "Row-level security rejected a write");
                ApiError::InternalError("Row-level security policy violation".to_string())
            }
            StoreError::TenantScope(source) => {
                ApiError::InternalError(format!("Failed to open tenant scope: {}", source))
            }
            StoreError::Database(source) => ApiError::InternalError(format!("Database error: {}", source)),
        }
    }
}

/// Client-facing text for a violated constraint
fn conflict_message(constraint: &str) -> String {
    match constraint {
        "tenants_slug_key" => "Tenant slug is already taken".to_string(),
        "users_tenant_email_key" => "Email already exists".to_string(),
        "todos_pkey" => "Todo id is already in use".to_string(),
        other => {
            tracing::debug!(constraint = %other, "Unmapped constraint conflict");
            "The request conflicts with existing data".to_string()
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(e) => ApiError::InternalError(format!("Failed to sign token: {}", e)),
            other => {
                tracing::debug!(reason = %other, "Rejected token");
                ApiError::Unauthorized
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Weak(reason) => ApiError::invalid("password", reason),
            other => ApiError::InternalError(format!("Password operation failed: {}", other)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed {} check", e.code));
                    ValidationErrorDetail::new(field.to_string(), message)
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}
