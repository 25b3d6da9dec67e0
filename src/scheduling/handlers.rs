use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::models::FulfillmentType;
use crate::AppState;

use super::error::SlotError;
use super::models::{TimeWindow, Timeslot};

/// Request DTO for slot generation over a date range
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSlotsRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fulfillment_type: FulfillmentType,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: u32,
    #[validate(length(min = 1, message = "At least one time window is required"))]
    pub windows: Vec<TimeWindow>,
}

#[derive(Debug, Deserialize)]
pub struct ListSlotsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fulfillment_type: FulfillmentType,
}

/// POST /api/slots/generate - materialize and register slots for a range
///
/// Re-running for an overlapping range is safe: existing slots keep their
/// reservation counts and only pick up capacity or end-time changes.
pub async fn generate_slots(
    State(state): State<AppState>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<(StatusCode, Json<Vec<Timeslot>>), SlotError> {
    request
        .validate()
        .map_err(|e| SlotError::Validation(e.to_string()))?;

    let generated = state
        .slot_generator
        .generate(
            request.start_date,
            request.end_date,
            request.fulfillment_type,
            request.capacity,
            &request.windows,
        )
        .await?;

    state.slot_store.upsert_slots(generated.clone()).await?;

    tracing::info!(
        "Generated {} {} slots for {}..={}",
        generated.len(),
        request.fulfillment_type,
        request.start_date,
        request.end_date
    );
    Ok((StatusCode::CREATED, Json(generated)))
}

/// GET /api/slots - list slots with live reservation counts
pub async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<Vec<Timeslot>>, SlotError> {
    let slots = state
        .slot_store
        .list(query.start_date, query.end_date, query.fulfillment_type)
        .await;
    Ok(Json(slots))
}
