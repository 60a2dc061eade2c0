use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BudgetError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login required")]
    MissingSession,

    #[error("CSRF token missing or invalid")]
    CsrfRejected,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl BudgetError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        BudgetError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn user_not_found(id: i64) -> Self {
        BudgetError::NotFound { entity: "user", id }
    }

    /// Text safe to show to the end user. Internal faults never leak details.
    pub fn user_message(&self) -> String {
        match self {
            BudgetError::Validation { message, .. } => message.clone(),
            BudgetError::InvalidCredentials => "Invalid credentials".to_string(),
            BudgetError::MissingSession => "Please log in first".to_string(),
            BudgetError::CsrfRejected => {
                "The form has expired; please reload the page and try again".to_string()
            }
            BudgetError::NotFound { entity, .. } => format!("The requested {entity} was not found"),
            BudgetError::DatabaseError(_) => {
                "A storage error occurred; please try again".to_string()
            }
            BudgetError::PasswordHash(_)
            | BudgetError::RactorError(_)
            | BudgetError::Config(_) => "An internal error occurred".to_string(),
        }
    }
}

/// Whether retrying the failed operation may succeed.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BudgetError {
    fn is_retryable(&self) -> bool {
        match self {
            BudgetError::DatabaseError(e) => match e {
                SqlxError::PoolTimedOut | SqlxError::Io(_) => true,
                // SQLITE_BUSY, SQLITE_LOCKED, BUSY_RECOVERY, BUSY_SNAPSHOT
                SqlxError::Database(db) => {
                    matches!(db.code().as_deref(), Some("5" | "6" | "261" | "517"))
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl IntoResponse for BudgetError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            BudgetError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BudgetError::CsrfRejected => (StatusCode::BAD_REQUEST, "CSRF_ERROR"),
            BudgetError::InvalidCredentials | BudgetError::MissingSession => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            BudgetError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            BudgetError::DatabaseError(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR"),
            BudgetError::PasswordHash(_)
            | BudgetError::RactorError(_)
            | BudgetError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message: self.user_message(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
