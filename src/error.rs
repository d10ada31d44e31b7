//! Application error type shared by every handler.
//!
//! Each variant maps to one HTTP status and a stable error code so the
//! frontend can branch on `error` instead of parsing messages.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Booking cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Payment error: {message}")]
    Payment { message: String },

    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    error: &'static str,
    message: String,
}

impl AppError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Conflict { .. } => "CONFLICT",
            Self::Payment { .. } => "PAYMENT_REQUIRED",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::InvalidTransition { .. } | Self::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Payment { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match self {
            Self::Database(e) => {
                error!("Database error: {}", e);
                "An internal error occurred".to_string()
            }
            Self::Internal(e) => {
                error!("Internal error: {}", e);
                "An internal error occurred".to_string()
            }
            Self::Upstream { service, message } => {
                error!("{} request failed: {}", service, message);
                format!("{} is unavailable, please try again later", service)
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorBody {
            code: status.as_u16(),
            error: self.error_code(),
            message,
        })
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("bcrypt: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(format!("jwt: {}", e))
    }
}

impl From<mongodb::bson::oid::Error> for AppError {
    fn from(_: mongodb::bson::oid::Error) -> Self {
        Self::validation("Malformed id")
    }
}

impl From<mongodb::bson::de::Error> for AppError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        Self::Internal(format!("bson decode: {}", e))
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        Self::Internal(format!("bson encode: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        let service = e
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("upstream")
            .to_string();
        Self::Upstream {
            service,
            message: e.to_string(),
        }
    }
}

/// Validate a request body, returning `AppError::Validation` on failure.
pub fn validate_request<T: validator::Validate>(body: &T) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::validation(format_validation_errors(&e)))
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{}'", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "name too short"))]
        name: String,
        #[validate(range(min = 1, max = 5))]
        rating: i32,
    }

    #[test]
    fn statuses_follow_variant() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_found("Booking").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidTransition {
                from: "Pending".into(),
                to: "Completed".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Payment { message: "unpaid".into() }.status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::upstream("ImgBB", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[actix_web::test]
    async fn internal_errors_are_masked() {
        let resp = AppError::Internal("secret stack trace".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "INTERNAL_ERROR");
        assert_eq!(json["code"], 500);
        assert_eq!(json["message"], "An internal error occurred");
    }

    #[test]
    fn validation_messages_are_joined() {
        let sample = Sample {
            name: "ab".into(),
            rating: 9,
        };
        let err = validate_request(&sample).unwrap_err();
        match err {
            AppError::Validation { message } => {
                assert!(message.contains("name too short"));
                assert!(message.contains("Invalid value for 'rating'"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
