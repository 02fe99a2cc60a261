//! Atelier prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    bookings::{
        BookingError, BookingStores, SlotAvailabilityEngine,
        blocks::{BlockMatch, BlockScope, BlockedPeriod, GlobalBlock, GlobalBlockFilter},
        memory::InMemoryBookings,
        models::{
            Booking, BookingRequest, BookingStatus, BookingType, Slot, SlotAvailability, SlotRef,
        },
        occupancy::{OccupancyCalculator, OccupancyModel},
    },
    checkout::{
        CheckoutError, CheckoutOutcome, CheckoutPricingPipeline, CheckoutService,
        CheckoutSettings, PlaceOrder, PricedOrder, PricingError,
        basket::{CartItem, CheckoutRequest, Destination},
        catalog::{CatalogProduct, InMemoryCatalog, ProductCatalog, ProductId},
        coupons::{Coupon, CouponEvaluator, CouponRejection, DiscountKind},
        exchange::{FallbackExchangeRates, NbpExchangeRateProvider, RateSource},
        orders::{InMemoryOrders, Order, OrderDocument, PaymentStatus},
        payments::{PaymentMethod, PaymentProvider},
        shipping::{ShippingRate, TableShippingRates},
    },
    clock::{Clock, FixedClock, SystemClock},
    config::EngineConfig,
    contact::CustomerInfo,
    money::Price,
    notifications::{LogNotifier, Notification, NotificationDispatcher, Notifier},
    storage::RepositoryError,
};
