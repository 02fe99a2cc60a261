//! Checkout
//!
//! Server-side pricing of untrusted carts and placement of the resulting
//! orders.

pub mod basket;
pub mod catalog;
pub mod coupons;
pub mod errors;
pub mod exchange;
pub mod lines;
pub mod orders;
pub mod payments;
pub mod pipeline;
pub mod service;
pub mod shipping;

pub use errors::{CheckoutError, PricingError};
pub use pipeline::{CheckoutPricingPipeline, PricedOrder};
pub use service::{CheckoutOutcome, CheckoutService, CheckoutSettings, PlaceOrder};
