//! Bookings
//!
//! Slot occupancy, global blackouts and the availability engine that books
//! people into slots.

pub mod blocks;
pub mod engine;
pub mod errors;
pub mod generation;
pub mod locks;
pub mod memory;
pub mod models;
pub mod occupancy;
pub mod repository;

pub use engine::{BookingStores, SlotAvailabilityEngine};
pub use errors::BookingError;
