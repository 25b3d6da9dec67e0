use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::collaborators::GatewayError;
use crate::promos::error::PromoError;
use crate::scheduling::error::SlotError;

use super::pricing::PricingError;

/// Error types for order lifecycle operations
///
/// Validation and promo rejections happen before any side effect and are
/// safe to retry after the caller fixes the input. Slot and gateway failures
/// abort the whole operation; no partial state survives.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    PromoRejected(#[from] PromoError),

    #[error(transparent)]
    SlotUnavailable(#[from] SlotError),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Payment gateway failure: {0}")]
    GatewayFailure(#[from] GatewayError),

    #[error("Order not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        OrderError::Validation(err.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        match self {
            // Promo and slot errors carry their own status mapping
            OrderError::PromoRejected(err) => err.into_response(),
            OrderError::SlotUnavailable(err) => err.into_response(),
            other => {
                let (status, message) = match &other {
                    OrderError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                    OrderError::InvalidTransition(msg) => {
                        // Programmer/UI error: log it, reject it
                        tracing::warn!("Invalid transition attempt: {}", msg);
                        (StatusCode::CONFLICT, other.to_string())
                    }
                    OrderError::GatewayFailure(_) => {
                        tracing::error!("{}", other);
                        (StatusCode::BAD_GATEWAY, other.to_string())
                    }
                    OrderError::NotFound => {
                        (StatusCode::NOT_FOUND, "Order not found".to_string())
                    }
                    OrderError::Storage(msg) => {
                        tracing::error!("Storage error: {}", msg);
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "An internal error occurred".to_string(),
                        )
                    }
                    OrderError::PromoRejected(_) | OrderError::SlotUnavailable(_) => {
                        unreachable!("handled above")
                    }
                };

                let body = Json(json!({
                    "error": message,
                }));

                (status, body).into_response()
            }
        }
    }
}
