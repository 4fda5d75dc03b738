//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Handlers that can recover from a failure (form validation, unknown tasks) turn it into
//! a flash message and a redirect; everything else propagates as an `AppError` and is
//! rendered by the `ResponseError` implementation below as a JSON body.
//!
//! `From` conversions cover `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error` and `actix_web::error::BlockingError`, so the `?`
//! operator can be used across the data, session and hashing layers.

use actix_web::{error::BlockingError, error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Message sent when a duplicate email trips the `users.email` unique index.
pub const DUPLICATE_EMAIL: &str = "Email is already registered.";

/// Represents all possible errors that can occur within the application.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid session where one is required (HTTP 401).
    Unauthorized(String),
    /// Malformed request, including CSRF rejections (HTTP 400).
    BadRequest(String),
    /// Requested resource does not exist or is not owned by the requester (HTTP 404).
    NotFound(String),
    /// Unexpected server-side error (HTTP 500).
    InternalServerError(String),
    /// Error originating from `sqlx` (HTTP 500). Details are logged, not returned.
    DatabaseError(String),
    /// One or more user-input checks failed (HTTP 422). All messages are kept, in order.
    ValidationError(Vec<String>),
    /// Invalid process configuration.
    Config(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError(vec![message.into()])
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
            AppError::ValidationError(msgs) => write!(f, "Validation Error: {}", msgs.join(" ")),
            AppError::Config(msg) => write!(f, "Configuration Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into `HttpResponse` objects.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Unauthorized(msg) | AppError::BadRequest(msg) | AppError::NotFound(msg) => {
                json!({ "error": msg })
            }
            AppError::ValidationError(msgs) => json!({
                "error": "Validation failed",
                "details": msgs
            }),
            AppError::DatabaseError(msg) => {
                log::error!("database error: {}", msg);
                json!({ "error": "Internal server error" })
            }
            AppError::InternalServerError(msg) | AppError::Config(msg) => {
                log::error!("internal error: {}", msg);
                json!({ "error": "Internal server error" })
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` maps to `NotFound`; the only unique index is `users.email`, so a
/// unique violation is reported as the duplicate-email validation failure.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::validation(DUPLICATE_EMAIL)
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// Fields are visited alphabetically; callers that need a specific order use
/// [`validation_messages`] directly.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields: Vec<&'static str> = errors.field_errors().keys().copied().collect();
        fields.sort_unstable();
        AppError::ValidationError(validation_messages(&errors, &fields))
    }
}

/// Converts `jsonwebtoken::errors::Error` into `AppError::Unauthorized`.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid session: {}", error))
    }
}

/// A closure passed to `web::block` was cancelled or panicked.
impl From<BlockingError> for AppError {
    fn from(error: BlockingError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Flattens validation errors into display messages, visiting `field_order` in turn.
///
/// Errors without a custom message fall back to their code.
pub fn validation_messages(errors: &ValidationErrors, field_order: &[&'static str]) -> Vec<String> {
    let field_errors = errors.field_errors();
    field_order
        .iter()
        .filter_map(|field| field_errors.get(field))
        .flat_map(|errs| errs.iter())
        .map(|err| match &err.message {
            Some(msg) => msg.to_string(),
            None => err.code.to_string(),
        })
        .collect()
}
