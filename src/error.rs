use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::types::EventId;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Snapshot fetch returned HTTP {status} for {url}")]
    FetchStatus { status: u16, url: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Event {0} not found")]
    EventNotFound(EventId),

    #[error("Bout {bout_id} not found for event {event_id}")]
    BoutNotFound { event_id: EventId, bout_id: i64 },

    #[error("Invalid event status: {0:?}")]
    InvalidStatus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::EventNotFound(_) | AppError::BoutNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
