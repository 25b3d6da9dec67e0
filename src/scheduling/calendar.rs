// Store hours and blackout dates
//
// The calendar is read-mostly configuration maintained by the admin
// back-office; this core only consumes it, so it sits behind a trait.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::models::{BlackoutDate, StoreHours};

/// Read-only view of store hours and blackout dates
#[async_trait]
pub trait StoreCalendar: Send + Sync {
    /// Hours for a weekday (0 = Sunday .. 6 = Saturday); None means no record
    async fn hours_for_weekday(&self, weekday: u8) -> Option<StoreHours>;

    /// Blackout record for a date, if any
    async fn blackout_for(&self, date: NaiveDate) -> Option<BlackoutDate>;
}

/// Weekday index for a date, matching the StoreHours convention
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// In-memory calendar adapter
///
/// Holds the hours/blackout configuration behind RwLocks so admin-side
/// updates and concurrent generator/reservation reads stay consistent.
pub struct InMemoryCalendar {
    hours: RwLock<HashMap<u8, StoreHours>>,
    blackouts: RwLock<HashMap<NaiveDate, BlackoutDate>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self {
            hours: RwLock::new(HashMap::new()),
            blackouts: RwLock::new(HashMap::new()),
        }
    }

    /// Calendar with the same open/close hours every day of the week
    pub fn with_uniform_hours(open: NaiveTime, close: NaiveTime) -> Self {
        let mut hours = HashMap::new();
        for weekday in 0..7u8 {
            hours.insert(
                weekday,
                StoreHours {
                    weekday,
                    open_time: open,
                    close_time: close,
                    is_closed: false,
                },
            );
        }
        Self {
            hours: RwLock::new(hours),
            blackouts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_hours(&self, hours: StoreHours) {
        self.hours.write().await.insert(hours.weekday, hours);
    }

    pub async fn add_blackout(&self, blackout: BlackoutDate) {
        self.blackouts.write().await.insert(blackout.date, blackout);
    }

    pub async fn remove_blackout(&self, date: NaiveDate) {
        self.blackouts.write().await.remove(&date);
    }
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreCalendar for InMemoryCalendar {
    async fn hours_for_weekday(&self, weekday: u8) -> Option<StoreHours> {
        self.hours.read().await.get(&weekday).cloned()
    }

    async fn blackout_for(&self, date: NaiveDate) -> Option<BlackoutDate> {
        self.blackouts.read().await.get(&date).cloned()
    }
}
