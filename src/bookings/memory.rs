//! In-memory booking store
//!
//! Backs every booking repository with process memory. Used by the CLI and
//! tests; a database-backed store implements the same traits.

use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use jiff::civil::DateTime;
use rustc_hash::FxHashMap;

use crate::{
    bookings::{
        blocks::{GlobalBlock, GlobalBlockUuid},
        models::{Booking, BookingUuid, Slot, SlotUuid},
        repository::{BookingRepository, GlobalBlockRepository, SlotRepository},
    },
    storage::RepositoryError,
};

#[derive(Debug, Default)]
struct State {
    slots: BTreeMap<DateTime, Slot>,
    bookings: FxHashMap<BookingUuid, Booking>,
    blocks: Vec<GlobalBlock>,
}

/// Slots, bookings and global blocks held in memory.
#[derive(Debug, Default)]
pub struct InMemoryBookings {
    state: RwLock<State>,
}

impl InMemoryBookings {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding existing records. Later slots replace earlier
    /// ones with the same start time.
    pub fn seeded(
        slots: impl IntoIterator<Item = Slot>,
        bookings: impl IntoIterator<Item = Booking>,
        blocks: impl IntoIterator<Item = GlobalBlock>,
    ) -> Self {
        let state = State {
            slots: slots
                .into_iter()
                .map(|slot| (slot.starts_at, slot))
                .collect(),
            bookings: bookings
                .into_iter()
                .map(|booking| (booking.uuid, booking))
                .collect(),
            blocks: blocks.into_iter().collect(),
        };

        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SlotRepository for InMemoryBookings {
    async fn list_slots(
        &self,
        from: DateTime,
        until: DateTime,
    ) -> Result<Vec<Slot>, RepositoryError> {
        if until <= from {
            return Ok(Vec::new());
        }

        Ok(self
            .read()
            .slots
            .range(from..until)
            .map(|(_, slot)| slot.clone())
            .collect())
    }

    async fn get_slot(&self, uuid: SlotUuid) -> Result<Slot, RepositoryError> {
        self.read()
            .slots
            .values()
            .find(|slot| slot.uuid == uuid)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_slot_at(&self, starts_at: DateTime) -> Result<Option<Slot>, RepositoryError> {
        Ok(self.read().slots.get(&starts_at).cloned())
    }

    async fn create_slots(&self, slots: Vec<Slot>) -> Result<usize, RepositoryError> {
        let mut state = self.write();
        let mut created = 0;

        for slot in slots {
            if state.slots.contains_key(&slot.starts_at) {
                continue;
            }

            state.slots.insert(slot.starts_at, slot);
            created += 1;
        }

        Ok(created)
    }

    async fn update_slot(&self, slot: Slot) -> Result<Slot, RepositoryError> {
        let mut state = self.write();

        let current = state
            .slots
            .iter()
            .find(|(_, stored)| stored.uuid == slot.uuid)
            .map(|(starts_at, _)| *starts_at)
            .ok_or(RepositoryError::NotFound)?;

        if current != slot.starts_at && state.slots.contains_key(&slot.starts_at) {
            return Err(RepositoryError::AlreadyExists);
        }

        state.slots.remove(&current);
        state.slots.insert(slot.starts_at, slot.clone());

        Ok(slot)
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookings {
    async fn list_bookings(
        &self,
        from: DateTime,
        until: DateTime,
    ) -> Result<Vec<Booking>, RepositoryError> {
        let mut bookings: Vec<Booking> = self
            .read()
            .bookings
            .values()
            .filter(|booking| booking.starts_at >= from && booking.starts_at < until)
            .cloned()
            .collect();

        bookings.sort_by_key(|booking| (booking.starts_at, booking.uuid));

        Ok(bookings)
    }

    async fn get_booking(&self, uuid: BookingUuid) -> Result<Booking, RepositoryError> {
        self.read()
            .bookings
            .get(&uuid)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut state = self.write();

        if state.bookings.contains_key(&booking.uuid) {
            return Err(RepositoryError::AlreadyExists);
        }

        state.bookings.insert(booking.uuid, booking.clone());

        Ok(booking)
    }

    async fn update_booking(&self, booking: Booking) -> Result<Booking, RepositoryError> {
        let mut state = self.write();

        let stored = state
            .bookings
            .get_mut(&booking.uuid)
            .ok_or(RepositoryError::NotFound)?;

        *stored = booking.clone();

        Ok(booking)
    }
}

#[async_trait]
impl GlobalBlockRepository for InMemoryBookings {
    async fn list_blocks(&self) -> Result<Vec<GlobalBlock>, RepositoryError> {
        Ok(self.read().blocks.clone())
    }

    async fn create_block(&self, block: GlobalBlock) -> Result<GlobalBlock, RepositoryError> {
        let mut state = self.write();

        if state.blocks.iter().any(|stored| stored.uuid == block.uuid) {
            return Err(RepositoryError::AlreadyExists);
        }

        state.blocks.push(block.clone());

        Ok(block)
    }

    async fn delete_block(&self, uuid: GlobalBlockUuid) -> Result<(), RepositoryError> {
        let mut state = self.write();
        let before = state.blocks.len();

        state.blocks.retain(|block| block.uuid != uuid);

        if state.blocks.len() == before {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
