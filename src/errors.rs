use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MiningEngineError>;

#[derive(Error, Debug)]
pub enum MiningEngineError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Task not found: {0}")]
    TaskNotFound(i32),

    #[error("Task already completed: {title}")]
    AlreadyCompleted { title: String },

    #[error("Daily task already completed today: {title}")]
    AlreadyCompletedToday { title: String },

    #[error("You can mine again in {seconds_remaining} seconds")]
    CooldownActive { seconds_remaining: i64 },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for MiningEngineError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Server-side failures get a generic message; internal detail stays
        // in the logs.
        let error_message = if status_code.is_server_error() {
            "Server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        });

        if let MiningEngineError::CooldownActive { seconds_remaining } = self {
            body["error"]["seconds_remaining"] = json!(seconds_remaining);
        }

        HttpResponse::build(status_code).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            MiningEngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MiningEngineError::DecimalParse(_) => StatusCode::BAD_REQUEST,
            MiningEngineError::Validation(_) => StatusCode::BAD_REQUEST,
            MiningEngineError::UserNotFound(_) => StatusCode::NOT_FOUND,
            MiningEngineError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            MiningEngineError::AlreadyCompleted { .. } => StatusCode::CONFLICT,
            MiningEngineError::AlreadyCompletedToday { .. } => StatusCode::CONFLICT,
            MiningEngineError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            MiningEngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl MiningEngineError {
    fn error_type(&self) -> &str {
        match self {
            MiningEngineError::Database(_) => "database_error",
            MiningEngineError::DecimalParse(_) => "decimal_parse_error",
            MiningEngineError::Validation(_) => "validation_error",
            MiningEngineError::UserNotFound(_) => "not_found",
            MiningEngineError::TaskNotFound(_) => "not_found",
            MiningEngineError::AlreadyCompleted { .. } => "already_completed",
            MiningEngineError::AlreadyCompletedToday { .. } => "already_completed",
            MiningEngineError::CooldownActive { .. } => "cooldown",
            MiningEngineError::Internal(_) => "internal_error",
        }
    }
}
