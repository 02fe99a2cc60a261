//! Atelier
//!
//! Booking and checkout engine for a small studio venue: slot occupancy and
//! availability with global blackouts, plus server-side pricing of shop carts
//! with coupons, shipping and currency conversion.

pub mod bookings;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod contact;
pub mod fixtures;
pub mod money;
pub mod notifications;
pub mod observability;
pub mod prelude;
pub mod storage;
pub mod uuids;
