//! Booking engine errors.

use thiserror::Error;

use crate::{bookings::blocks::BlockMatch, config::ConfigError, storage::RepositoryError};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("party size must be positive")]
    InvalidPartySize,

    #[error("slot capacity must be positive")]
    InvalidCapacity,

    #[error("slot not found")]
    SlotNotFound,

    #[error("booking not found")]
    BookingNotFound,

    #[error("global block not found")]
    BlockNotFound,

    #[error("slot has already started")]
    SlotInPast,

    #[error("slot is blocked")]
    SlotBlocked(BlockMatch),

    #[error("insufficient capacity: {remaining} remaining, {requested} requested")]
    InsufficientCapacity { remaining: u32, requested: u32 },

    #[error("invalid calendar value")]
    Time(#[from] jiff::Error),

    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("storage error")]
    Repository(#[from] RepositoryError),
}

impl BookingError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPartySize => "INVALID_PARTY_SIZE",
            Self::InvalidCapacity => "INVALID_CAPACITY",
            Self::SlotNotFound => "SLOT_NOT_FOUND",
            Self::BookingNotFound => "BOOKING_NOT_FOUND",
            Self::BlockNotFound => "BLOCK_NOT_FOUND",
            Self::SlotInPast => "SLOT_IN_PAST",
            Self::SlotBlocked(_) => "SLOT_BLOCKED",
            Self::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            Self::Time(_) => "INVALID_TIME",
            Self::Config(_) => "CONFIGURATION",
            Self::Repository(_) => "STORAGE",
        }
    }

    /// Whether this is an expected outcome of caller input rather than a
    /// failure of the system.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Repository(_))
    }

    pub(crate) fn not_found_as(error: RepositoryError, not_found: Self) -> Self {
        match error {
            RepositoryError::NotFound => not_found,
            other => Self::Repository(other),
        }
    }
}
