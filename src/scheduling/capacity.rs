// Slot capacity store
//
// Tracks reservation counts per (date, start, fulfillment type) slot and
// exposes atomic reserve/release/move operations. Every mutation happens
// under that slot's own mutex, never a global lock; a move holds both slot
// locks, acquired in SlotKey order so concurrent moves cannot deadlock.
// Lock waits are bounded so callers fail fast instead of queueing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tokio::time::timeout;

use crate::models::FulfillmentType;

use super::calendar::StoreCalendar;
use super::error::SlotError;
use super::models::{SlotKey, Timeslot};

/// Mutable state of one slot, guarded by its per-key mutex
#[derive(Debug, Clone)]
struct SlotState {
    end_time: chrono::NaiveTime,
    max_capacity: u32,
    reserved_count: u32,
}

/// Capacity bookkeeping for all known slots
///
/// The registry maps each SlotKey to an `Arc<Mutex<SlotState>>`; the outer
/// RwLock only guards registry membership, so reservations on different
/// slots proceed fully in parallel.
pub struct SlotCapacityStore {
    calendar: Arc<dyn StoreCalendar>,
    slots: RwLock<HashMap<SlotKey, Arc<Mutex<SlotState>>>>,
    lock_wait: Duration,
}

impl SlotCapacityStore {
    pub fn new(calendar: Arc<dyn StoreCalendar>, lock_wait: Duration) -> Self {
        Self {
            calendar,
            slots: RwLock::new(HashMap::new()),
            lock_wait,
        }
    }

    /// Insert or update slots, keyed by (date, start, type)
    ///
    /// Re-running generation for an overlapping range updates capacity and
    /// end time in place and never duplicates a slot or resets its
    /// reservation count. A capacity below the current reservation count is
    /// refused for that slot so the occupancy invariant holds.
    pub async fn upsert_slots(&self, generated: Vec<Timeslot>) -> Result<usize, SlotError> {
        let mut registry = self.slots.write().await;
        let mut touched = 0;

        for slot in generated {
            match registry.get(&slot.key) {
                Some(existing) => {
                    let mut state = existing.lock().await;
                    if slot.max_capacity < state.reserved_count {
                        tracing::warn!(
                            "Refusing capacity {} for slot {} with {} reservations",
                            slot.max_capacity,
                            slot.key,
                            state.reserved_count
                        );
                        continue;
                    }
                    state.max_capacity = slot.max_capacity;
                    state.end_time = slot.end_time;
                }
                None => {
                    registry.insert(
                        slot.key,
                        Arc::new(Mutex::new(SlotState {
                            end_time: slot.end_time,
                            max_capacity: slot.max_capacity,
                            reserved_count: 0,
                        })),
                    );
                }
            }
            touched += 1;
        }

        Ok(touched)
    }

    /// Atomically reserve one spot in a slot
    ///
    /// Fails with `Full` when the slot is at capacity, with `Blackout` when
    /// the date has since been blacked out, and with `LockTimeout` when the
    /// slot lock cannot be acquired within the configured bound.
    pub async fn reserve(&self, key: SlotKey) -> Result<(), SlotError> {
        if let Some(blackout) = self.calendar.blackout_for(key.date).await {
            return Err(SlotError::Blackout {
                date: blackout.date,
                reason: blackout.reason,
            });
        }

        let slot = self.slot_handle(&key).await?;
        let mut state = self.lock_state(&key, &slot).await?;

        if state.reserved_count >= state.max_capacity {
            tracing::debug!("Slot {} is full ({} spots)", key, state.max_capacity);
            return Err(SlotError::Full(key));
        }
        state.reserved_count += 1;
        tracing::debug!(
            "Reserved slot {}: {}/{}",
            key,
            state.reserved_count,
            state.max_capacity
        );
        Ok(())
    }

    /// Release one reservation, floored at zero
    pub async fn release(&self, key: SlotKey) -> Result<(), SlotError> {
        let slot = self.slot_handle(&key).await?;
        let mut state = self.lock_state(&key, &slot).await?;

        if state.reserved_count == 0 {
            tracing::warn!("Release on slot {} with no reservations", key);
        }
        state.reserved_count = state.reserved_count.saturating_sub(1);
        Ok(())
    }

    /// Atomically move a reservation between two slots
    ///
    /// Either both the decrement on `from` and the increment on `to` happen,
    /// or neither does; a full destination rejects the move and leaves the
    /// source untouched. Both locks are taken in SlotKey order.
    pub async fn move_reservation(&self, from: SlotKey, to: SlotKey) -> Result<(), SlotError> {
        if from == to {
            return Ok(());
        }

        if let Some(blackout) = self.calendar.blackout_for(to.date).await {
            return Err(SlotError::Blackout {
                date: blackout.date,
                reason: blackout.reason,
            });
        }

        let from_slot = self.slot_handle(&from).await?;
        let to_slot = self.slot_handle(&to).await?;

        // Fixed global lock order prevents deadlock between concurrent moves
        let (mut from_state, mut to_state) = if from < to {
            let f = self.lock_state_owned(&from, from_slot).await?;
            let t = self.lock_state_owned(&to, to_slot).await?;
            (f, t)
        } else {
            let t = self.lock_state_owned(&to, to_slot).await?;
            let f = self.lock_state_owned(&from, from_slot).await?;
            (f, t)
        };

        if to_state.reserved_count >= to_state.max_capacity {
            return Err(SlotError::Full(to));
        }

        from_state.reserved_count = from_state.reserved_count.saturating_sub(1);
        to_state.reserved_count += 1;
        tracing::debug!("Moved reservation from {} to {}", from, to);
        Ok(())
    }

    /// Remove a slot; rejected while it still holds reservations so orders
    /// referencing it are never orphaned
    pub async fn remove(&self, key: SlotKey) -> Result<(), SlotError> {
        let mut registry = self.slots.write().await;
        let slot = registry
            .get(&key)
            .cloned()
            .ok_or(SlotError::UnknownSlot(key))?;

        let state = slot.lock().await;
        if state.reserved_count > 0 {
            return Err(SlotError::HasReservations(key));
        }
        drop(state);
        registry.remove(&key);
        Ok(())
    }

    /// Snapshot of one slot
    pub async fn get(&self, key: SlotKey) -> Option<Timeslot> {
        let slot = self.slots.read().await.get(&key).cloned()?;
        let state = slot.lock().await;
        Some(Timeslot {
            key,
            end_time: state.end_time,
            max_capacity: state.max_capacity,
            reserved_count: state.reserved_count,
        })
    }

    /// Snapshot of all slots in a date range for one fulfillment type,
    /// ordered by key
    pub async fn list(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        fulfillment_type: FulfillmentType,
    ) -> Vec<Timeslot> {
        let registry = self.slots.read().await;
        let mut keys: Vec<SlotKey> = registry
            .keys()
            .filter(|k| {
                k.fulfillment_type == fulfillment_type
                    && k.date >= start_date
                    && k.date <= end_date
            })
            .copied()
            .collect();
        keys.sort();

        let mut slots = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(slot) = registry.get(&key) {
                let state = slot.lock().await;
                slots.push(Timeslot {
                    key,
                    end_time: state.end_time,
                    max_capacity: state.max_capacity,
                    reserved_count: state.reserved_count,
                });
            }
        }
        slots
    }

    async fn slot_handle(&self, key: &SlotKey) -> Result<Arc<Mutex<SlotState>>, SlotError> {
        self.slots
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(SlotError::UnknownSlot(*key))
    }

    async fn lock_state<'a>(
        &self,
        key: &SlotKey,
        slot: &'a Arc<Mutex<SlotState>>,
    ) -> Result<MutexGuard<'a, SlotState>, SlotError> {
        timeout(self.lock_wait, slot.lock())
            .await
            .map_err(|_| SlotError::LockTimeout(*key))
    }

    async fn lock_state_owned(
        &self,
        key: &SlotKey,
        slot: Arc<Mutex<SlotState>>,
    ) -> Result<OwnedMutexGuard<SlotState>, SlotError> {
        timeout(self.lock_wait, slot.lock_owned())
            .await
            .map_err(|_| SlotError::LockTimeout(*key))
    }
}
