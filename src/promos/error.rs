use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

/// Error types for promo validation and redemption
///
/// Rejection reasons are surfaced verbatim to the customer-facing caller;
/// order creation aborts on any of them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PromoError {
    #[error("Promo code '{0}' not found")]
    UnknownCode(String),

    #[error("Promo code '{0}' is no longer active")]
    Inactive(String),

    #[error("Promo code '{0}' is not valid yet")]
    NotStarted(String),

    #[error("Promo code '{0}' has expired")]
    Expired(String),

    #[error("Order subtotal is below the {minimum} minimum for promo '{code}'")]
    BelowMinimum { code: String, minimum: Decimal },

    #[error("Promo code '{0}' has been fully redeemed")]
    Exhausted(String),

    #[error("Promo code '{0}' was already used the maximum number of times for this customer")]
    PerCustomerLimit(String),
}

impl IntoResponse for PromoError {
    fn into_response(self) -> Response {
        let status = match self {
            PromoError::UnknownCode(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
