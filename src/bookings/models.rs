//! Booking Models

use jiff::{Timestamp, civil::DateTime};
use serde::Deserialize;

use crate::{contact::CustomerInfo, money::Price, uuids::TypedUuid};

/// Slot UUID
pub type SlotUuid = TypedUuid<Slot>;

/// Booking UUID
pub type BookingUuid = TypedUuid<Booking>;

/// A bookable start time with a headcount capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub uuid: SlotUuid,

    /// Venue-local start time, minute precision.
    pub starts_at: DateTime,

    /// Maximum headcount; always positive.
    pub capacity: u32,

    /// Administratively closed regardless of capacity.
    pub is_blocked: bool,

    /// Per-person price replacing the configured ticket price.
    pub price_override: Option<Price>,
}

/// New Slot Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewSlot {
    pub starts_at: DateTime,
    pub capacity: u32,
}

impl From<NewSlot> for Slot {
    fn from(slot: NewSlot) -> Self {
        Self {
            uuid: SlotUuid::new(),
            starts_at: slot.starts_at,
            capacity: slot.capacity,
            is_blocked: false,
            price_override: None,
        }
    }
}

/// What a booking is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    /// A guided visit.
    Sightseeing,

    /// A hands-on workshop, which keeps the room busy past its own slot.
    Workshop,
}

/// Booking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Whether bookings in this state hold capacity.
    #[must_use]
    pub const fn occupies(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Booking Model
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub uuid: BookingUuid,

    /// Slot the booking was made against, when created through the engine.
    pub slot: Option<SlotUuid>,

    /// Venue-local start time.
    pub starts_at: DateTime,

    pub kind: BookingType,

    /// Number of people; always positive.
    pub party_size: u32,

    pub status: BookingStatus,

    /// Per-person base price at the time of booking.
    pub unit_price: Price,

    pub customer: CustomerInfo,

    /// Free-form notes kept by staff.
    pub notes: Option<String>,

    pub reminder_sent_at: Option<Timestamp>,

    pub created_at: Timestamp,
}

impl Booking {
    /// Whether this booking holds capacity.
    #[must_use]
    pub const fn occupies(&self) -> bool {
        self.status.occupies()
    }
}

/// How a booking request names its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    /// A known slot identity.
    Id(SlotUuid),

    /// The slot starting at this venue-local instant.
    StartsAt(DateTime),
}

impl From<SlotUuid> for SlotRef {
    fn from(uuid: SlotUuid) -> Self {
        Self::Id(uuid)
    }
}

impl From<DateTime> for SlotRef {
    fn from(starts_at: DateTime) -> Self {
        Self::StartsAt(starts_at)
    }
}

/// A customer's request to book a start time.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub slot: SlotRef,
    pub kind: BookingType,
    pub party_size: u32,
    pub customer: CustomerInfo,
    pub notes: Option<String>,
}

/// A slot with its computed occupancy, as shown on the admin slot list.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAvailability {
    pub slot: Slot,

    /// Headcount committed under the configured occupancy model.
    pub occupied: u32,

    /// `max(0, capacity - occupied)`.
    pub remaining: u32,

    /// Why the slot cannot be booked, if it cannot.
    pub blocked_by: Option<crate::bookings::blocks::BlockMatch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_bookings_do_not_occupy() {
        assert!(BookingStatus::Pending.occupies());
        assert!(BookingStatus::Confirmed.occupies());
        assert!(!BookingStatus::Cancelled.occupies());
    }
}
