//! Booking repositories

use async_trait::async_trait;
use jiff::civil::DateTime;
use mockall::automock;

use crate::{
    bookings::{
        blocks::{GlobalBlock, GlobalBlockUuid},
        models::{Booking, BookingUuid, Slot, SlotUuid},
    },
    storage::RepositoryError,
};

#[automock]
#[async_trait]
pub trait SlotRepository: Send + Sync {
    /// Slots starting in `[from, until)`, ascending by start.
    async fn list_slots(&self, from: DateTime, until: DateTime)
    -> Result<Vec<Slot>, RepositoryError>;

    /// Retrieve a single slot.
    async fn get_slot(&self, uuid: SlotUuid) -> Result<Slot, RepositoryError>;

    /// The slot starting exactly at `starts_at`, if one exists.
    async fn find_slot_at(&self, starts_at: DateTime) -> Result<Option<Slot>, RepositoryError>;

    /// Store new slots, skipping any whose start instant already has a slot.
    /// Returns how many were stored.
    async fn create_slots(&self, slots: Vec<Slot>) -> Result<usize, RepositoryError>;

    /// Replace a stored slot.
    async fn update_slot(&self, slot: Slot) -> Result<Slot, RepositoryError>;
}

#[automock]
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Bookings of any status starting in `[from, until)`, ascending by start.
    async fn list_bookings(
        &self,
        from: DateTime,
        until: DateTime,
    ) -> Result<Vec<Booking>, RepositoryError>;

    /// Retrieve a single booking.
    async fn get_booking(&self, uuid: BookingUuid) -> Result<Booking, RepositoryError>;

    /// Store a new booking.
    async fn create_booking(&self, booking: Booking) -> Result<Booking, RepositoryError>;

    /// Replace a stored booking.
    async fn update_booking(&self, booking: Booking) -> Result<Booking, RepositoryError>;
}

#[automock]
#[async_trait]
pub trait GlobalBlockRepository: Send + Sync {
    /// Every active block.
    async fn list_blocks(&self) -> Result<Vec<GlobalBlock>, RepositoryError>;

    /// Store a new block.
    async fn create_block(&self, block: GlobalBlock) -> Result<GlobalBlock, RepositoryError>;

    /// Remove a block.
    async fn delete_block(&self, uuid: GlobalBlockUuid) -> Result<(), RepositoryError>;
}
