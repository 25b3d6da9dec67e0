use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::FulfillmentType;

/// Identity of a bookable fulfillment slot
///
/// A slot is the (date, start time, fulfillment type) tuple; the same window
/// on the same day is a distinct slot for pickup and for delivery. The derived
/// `Ord` gives the fixed global order used when two slot locks must be held at
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub fulfillment_type: FulfillmentType,
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date,
            self.start_time.format("%H:%M"),
            self.fulfillment_type
        )
    }
}

/// A bookable time window with finite capacity
///
/// Invariant: `0 <= reserved_count <= max_capacity`, including under
/// concurrent reservation attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeslot {
    pub key: SlotKey,
    pub end_time: NaiveTime,
    pub max_capacity: u32,
    pub reserved_count: u32,
}

impl Timeslot {
    /// Spots still open in this slot
    pub fn remaining(&self) -> u32 {
        self.max_capacity.saturating_sub(self.reserved_count)
    }
}

/// A (start, end) window within a day, used as generator input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Opening hours for one weekday (0 = Sunday .. 6 = Saturday)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHours {
    pub weekday: u8,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_closed: bool,
}

/// A calendar date on which no slots may be generated or booked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutDate {
    pub date: NaiveDate,
    pub reason: Option<String>,
}
