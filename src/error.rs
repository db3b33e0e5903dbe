//! Crate-wide error taxonomy.
//!
//! Authorization and not-found failures are terminal: the caller gets them
//! back unchanged and must not retry. `StoreUnavailable` is the only
//! retryable variant. A live push that reaches zero connections is not an
//! error anywhere in this crate — it is a delivered count of 0.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("not found")]
    NotFound,

    /// Caller is not an authorized participant or owner.
    #[error("caller is not a participant or owner")]
    Forbidden,

    /// Message append attempted on a deactivated room.
    #[error("chat room is closed")]
    RoomClosed,

    /// Connection was no longer open at registration time.
    #[error("connection already closed")]
    AlreadyClosed,

    /// Room creation with buyer == seller.
    #[error("buyer and seller must be distinct users")]
    InvalidParticipants,

    /// Message content is empty or whitespace-only.
    #[error("message content must not be empty")]
    ContentEmpty,

    /// Message content exceeds the size limit.
    #[error("message content exceeds the size limit")]
    ContentTooLarge,

    /// Transient persistence failure. Callers retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            CoreError::NotFound => StatusCode::NOT_FOUND,
            CoreError::Forbidden => StatusCode::FORBIDDEN,
            CoreError::RoomClosed => StatusCode::CONFLICT,
            CoreError::AlreadyClosed => StatusCode::CONFLICT,
            CoreError::InvalidParticipants => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::ContentEmpty => StatusCode::BAD_REQUEST,
            CoreError::ContentTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound,
            other => CoreError::StoreUnavailable(other.to_string()),
        }
    }
}

/// A cancelled or panicked blocking task counts as a store failure:
/// the write may or may not have committed, so the caller must retry.
impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::StoreUnavailable(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}
