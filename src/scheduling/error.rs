use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;

use super::models::SlotKey;

/// Error types for slot generation and capacity operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SlotError {
    #[error("Slot {0} is fully booked")]
    Full(SlotKey),

    #[error("No slot exists at {0}")]
    UnknownSlot(SlotKey),

    #[error("Date {date} is blacked out{}", .reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default())]
    Blackout {
        date: NaiveDate,
        reason: Option<String>,
    },

    #[error("Timed out waiting for slot {0}")]
    LockTimeout(SlotKey),

    #[error("Slot {0} still has reservations and cannot be removed")]
    HasReservations(SlotKey),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for SlotError {
    fn into_response(self) -> Response {
        let status = match self {
            // Capacity full, blackout, closed day, and lock timeouts are all
            // "offer the caller another slot" outcomes
            SlotError::Full(_)
            | SlotError::Blackout { .. }
            | SlotError::LockTimeout(_)
            | SlotError::HasReservations(_) => StatusCode::CONFLICT,
            SlotError::UnknownSlot(_) => StatusCode::NOT_FOUND,
            SlotError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
