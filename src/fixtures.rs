//! Fixtures
//!
//! YAML descriptions of a venue (catalog, coupons, slots, bookings and
//! blocks) and of carts, loaded into the in-memory stores.

use std::{fs, path::Path, sync::Arc};

use jiff::{
    Timestamp,
    civil::{Date, DateTime},
};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    bookings::{
        blocks::{BlockParseError, BlockedPeriod, GlobalBlock, GlobalBlockUuid},
        memory::InMemoryBookings,
        models::{Booking, BookingStatus, BookingType, BookingUuid, Slot, SlotUuid},
    },
    checkout::{
        basket::{CartItem, CheckoutRequest, Destination},
        catalog::{CatalogProduct, InMemoryCatalog, ProductId},
        coupons::{Coupon, CouponUuid, DiscountKind, normalize_code},
        orders::InMemoryOrders,
    },
    contact::CustomerInfo,
    money::{self, AmountError},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price or unknown currency
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// Invalid block period
    #[error(transparent)]
    Block(#[from] BlockParseError),

    /// Currency mismatch between catalog products
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// The same product id is defined twice
    #[error("Duplicate product: {0}")]
    DuplicateProduct(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VenueFile {
    #[serde(default)]
    products: Vec<ProductFixture>,

    #[serde(default)]
    coupons: Vec<CouponFixture>,

    #[serde(default)]
    slots: Vec<SlotFixture>,

    #[serde(default)]
    bookings: Vec<BookingFixture>,

    #[serde(default)]
    blocks: Vec<BlockFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProductFixture {
    id: String,
    name: String,

    /// `AMOUNT CURRENCY`, e.g. `35.00 PLN`
    price: String,

    #[serde(default)]
    on_promotion: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CouponFixture {
    code: String,
    kind: DiscountKind,
    value: Decimal,

    #[serde(default)]
    min_amount: Option<Decimal>,

    #[serde(default)]
    max_uses: Option<u32>,

    #[serde(default)]
    uses: u32,

    #[serde(default)]
    exclude_other_promotions: bool,

    #[serde(default = "enabled")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SlotFixture {
    starts_at: DateTime,
    capacity: u32,

    #[serde(default)]
    blocked: bool,

    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BookingFixture {
    starts_at: DateTime,
    kind: BookingType,
    party_size: u32,

    #[serde(default = "confirmed")]
    status: BookingStatus,

    unit_price: String,
    customer: CustomerInfo,

    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlockFixture {
    scope: String,
    value: String,

    #[serde(default)]
    reason: Option<String>,
}

const fn enabled() -> bool {
    true
}

const fn confirmed() -> BookingStatus {
    BookingStatus::Confirmed
}

/// A parsed venue fixture.
#[derive(Debug, Clone, Default)]
pub struct VenueFixture {
    pub products: Vec<CatalogProduct>,
    pub coupons: Vec<Coupon>,
    pub slots: Vec<Slot>,
    pub bookings: Vec<Booking>,
    pub blocks: Vec<GlobalBlock>,

    /// Currency of the catalog, if it has any products.
    pub currency: Option<&'static Currency>,
}

/// In-memory stores seeded from a fixture.
#[derive(Debug)]
pub struct FixtureStores {
    pub catalog: Arc<InMemoryCatalog>,
    pub orders: Arc<InMemoryOrders>,
    pub bookings: Arc<InMemoryBookings>,
}

impl VenueFixture {
    /// Parse a venue fixture from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, a price or block period is
    /// invalid, or catalog products use different currencies.
    pub fn from_yaml_str(contents: &str) -> Result<Self, FixtureError> {
        let file: VenueFile = serde_norway::from_str(contents)?;
        let mut fixture = Self::default();

        for product in file.products {
            let unit_price = money::parse_price(&product.price)?;
            let currency = unit_price.currency();

            match fixture.currency {
                Some(existing) if existing != currency => {
                    return Err(FixtureError::CurrencyMismatch(
                        existing.iso_alpha_code.to_string(),
                        currency.iso_alpha_code.to_string(),
                    ));
                }
                Some(_) => {}
                None => fixture.currency = Some(currency),
            }

            if fixture
                .products
                .iter()
                .any(|existing| existing.id.as_str() == product.id)
            {
                return Err(FixtureError::DuplicateProduct(product.id));
            }

            fixture.products.push(CatalogProduct {
                id: ProductId::new(product.id),
                name: product.name,
                unit_price,
                on_promotion: product.on_promotion,
            });
        }

        fixture.coupons = file
            .coupons
            .into_iter()
            .map(|coupon| Coupon {
                uuid: CouponUuid::new(),
                code: normalize_code(&coupon.code),
                kind: coupon.kind,
                value: coupon.value,
                min_amount: coupon.min_amount,
                max_uses: coupon.max_uses,
                uses: coupon.uses,
                exclude_other_promotions: coupon.exclude_other_promotions,
                is_active: coupon.is_active,
            })
            .collect();

        for slot in file.slots {
            fixture.slots.push(Slot {
                uuid: SlotUuid::new(),
                starts_at: slot.starts_at,
                capacity: slot.capacity,
                is_blocked: slot.blocked,
                price_override: slot.price.as_deref().map(money::parse_price).transpose()?,
            });
        }

        let slot_ids = fixture
            .slots
            .iter()
            .map(|slot| (slot.starts_at, slot.uuid))
            .collect::<FxHashMap<_, _>>();

        for booking in file.bookings {
            fixture.bookings.push(Booking {
                uuid: BookingUuid::new(),
                slot: slot_ids.get(&booking.starts_at).copied(),
                starts_at: booking.starts_at,
                kind: booking.kind,
                party_size: booking.party_size,
                status: booking.status,
                unit_price: money::parse_price(&booking.unit_price)?,
                customer: booking.customer,
                notes: booking.notes,
                reminder_sent_at: None,
                created_at: Timestamp::UNIX_EPOCH,
            });
        }

        for block in file.blocks {
            fixture.blocks.push(GlobalBlock {
                uuid: GlobalBlockUuid::new(),
                period: BlockedPeriod::parse(&block.scope, &block.value)?,
                reason: block.reason,
            });
        }

        Ok(fixture)
    }

    /// Read and parse a venue fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// Slots starting on `date`.
    pub fn slots_on(&self, date: Date) -> impl Iterator<Item = &Slot> {
        self.slots
            .iter()
            .filter(move |slot| slot.starts_at.date() == date)
    }

    /// Seed the in-memory stores.
    #[must_use]
    pub fn into_stores(self) -> FixtureStores {
        FixtureStores {
            catalog: Arc::new(InMemoryCatalog::new(self.products)),
            orders: Arc::new(InMemoryOrders::new(self.coupons)),
            bookings: Arc::new(InMemoryBookings::seeded(
                self.slots,
                self.bookings,
                self.blocks,
            )),
        }
    }
}

/// A cart as a client would submit it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartFixture {
    pub items: Vec<CartItem>,

    #[serde(default)]
    pub coupon: Option<String>,

    #[serde(default)]
    pub destination: Destination,

    #[serde(default)]
    pub shipping_method: Option<String>,

    /// Currency to charge in; the base currency when absent.
    #[serde(default)]
    pub currency: Option<String>,
}

impl CartFixture {
    /// Parse a cart from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml_str(contents: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Read and parse a cart file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// Build a pricing request, charging in `base` unless the cart names a
    /// currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart names an unknown currency.
    pub fn into_request(self, base: &'static Currency) -> Result<CheckoutRequest, FixtureError> {
        let currency = match self.currency.as_deref() {
            Some(code) => money::find_currency(code)?,
            None => base,
        };

        Ok(CheckoutRequest {
            items: self.items,
            coupon_code: self.coupon,
            destination: self.destination,
            shipping_method: self.shipping_method,
            currency,
        })
    }
}
