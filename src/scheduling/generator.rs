// Slot generation
//
// Materializes bookable slots for a date range from store hours, blackout
// dates, and a caller-supplied set of time windows. Generation itself is
// pure with respect to capacity state; idempotency comes from the capacity
// store upserting by (date, start, type).

use chrono::NaiveDate;
use std::sync::Arc;

use crate::models::FulfillmentType;

use super::calendar::{weekday_index, StoreCalendar};
use super::error::SlotError;
use super::models::{SlotKey, TimeWindow, Timeslot};

/// Derives the set of valid slots for a date range
#[derive(Clone)]
pub struct SlotGenerator {
    calendar: Arc<dyn StoreCalendar>,
}

impl SlotGenerator {
    pub fn new(calendar: Arc<dyn StoreCalendar>) -> Self {
        Self { calendar }
    }

    /// Generate slots for every date in `[start_date, end_date]`
    ///
    /// For each date: skipped entirely if the date is blacked out or the
    /// weekday is closed; otherwise one slot per window, clipped to the
    /// store's open/close bounds. Windows that fall entirely outside the
    /// open hours produce no slot.
    pub async fn generate(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        fulfillment_type: FulfillmentType,
        capacity: u32,
        windows: &[TimeWindow],
    ) -> Result<Vec<Timeslot>, SlotError> {
        if start_date > end_date {
            return Err(SlotError::Validation(format!(
                "start_date {} is after end_date {}",
                start_date, end_date
            )));
        }
        if capacity == 0 {
            return Err(SlotError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }
        if windows.is_empty() {
            return Err(SlotError::Validation(
                "at least one time window is required".to_string(),
            ));
        }
        for window in windows {
            if window.start >= window.end {
                return Err(SlotError::Validation(format!(
                    "window start {} must be before end {}",
                    window.start.format("%H:%M"),
                    window.end.format("%H:%M")
                )));
            }
        }

        let mut slots = Vec::new();
        let mut date = start_date;
        while date <= end_date {
            if self.calendar.blackout_for(date).await.is_some() {
                tracing::debug!("Skipping blacked-out date {}", date);
                date = next_day(date)?;
                continue;
            }

            let hours = match self.calendar.hours_for_weekday(weekday_index(date)).await {
                Some(hours) if !hours.is_closed => hours,
                _ => {
                    tracing::debug!("Skipping closed date {}", date);
                    date = next_day(date)?;
                    continue;
                }
            };

            for window in windows {
                // Clip the window to the store's open/close bounds
                let start = window.start.max(hours.open_time);
                let end = window.end.min(hours.close_time);
                if start >= end {
                    continue;
                }

                slots.push(Timeslot {
                    key: SlotKey {
                        date,
                        start_time: start,
                        fulfillment_type,
                    },
                    end_time: end,
                    max_capacity: capacity,
                    reserved_count: 0,
                });
            }

            date = next_day(date)?;
        }

        Ok(slots)
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, SlotError> {
    date.succ_opt()
        .ok_or_else(|| SlotError::Validation(format!("date {} is out of range", date)))
}
