//! Orders
//!
//! Persisted orders and the store that writes them together with coupon use
//! counts.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;

use crate::{
    checkout::{
        coupons::{Coupon, CouponRepository, CouponUuid, normalize_code},
        lines::OrderLine,
        payments::PaymentMethod,
    },
    contact::CustomerInfo,
    money::Price,
    storage::RepositoryError,
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Waiting for an offline payment.
    AwaitingPayment,

    /// A provider transaction was opened.
    Initiated,

    /// The provider could not open a transaction.
    Failed,
}

/// Sales document issued for the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderDocument {
    #[default]
    Receipt,

    Invoice {
        company_name: String,
        tax_id: String,
        address: String,
    },
}

/// Order Model
///
/// Line items are a snapshot taken at checkout and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub uuid: OrderUuid,
    pub lines: Vec<OrderLine>,
    pub subtotal: Price,
    pub discount: Price,
    pub shipping: Price,
    pub shipping_method: String,
    pub total: Price,

    /// ISO code of the currency the order was charged in.
    pub currency: &'static str,

    /// Base units per charged unit, when the order was converted.
    pub exchange_rate: Option<Decimal>,

    pub coupon: Option<CouponUuid>,
    pub customer: CustomerInfo,
    pub document: OrderDocument,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: Timestamp,
}

/// A coupon use to record together with an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponRedemption {
    pub coupon: CouponUuid,
}

#[automock]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store an order and, in the same step, record the coupon use.
    ///
    /// Returns [`RepositoryError::Conflict`] without storing anything when the
    /// coupon has no uses left, and [`RepositoryError::Unavailable`] when it
    /// was removed or deactivated.
    async fn create_order(
        &self,
        order: Order,
        redemption: Option<CouponRedemption>,
    ) -> Result<Order, RepositoryError>;

    /// Retrieve a single order.
    async fn get_order(&self, uuid: OrderUuid) -> Result<Order, RepositoryError>;

    /// Record the outcome of payment initialisation.
    async fn set_payment_status(
        &self,
        uuid: OrderUuid,
        status: PaymentStatus,
    ) -> Result<Order, RepositoryError>;
}

#[derive(Debug, Default)]
struct State {
    coupons: FxHashMap<String, Coupon>,
    orders: FxHashMap<OrderUuid, Order>,
}

/// Coupons and orders held in memory, sharing one lock so coupon uses and
/// order writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryOrders {
    state: RwLock<State>,
}

impl InMemoryOrders {
    /// Create a store with the given coupons.
    pub fn new(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        let store = Self::default();

        for coupon in coupons {
            store.insert_coupon(coupon);
        }

        store
    }

    /// Add or replace a coupon, stored under its upper-case code.
    pub fn insert_coupon(&self, mut coupon: Coupon) {
        coupon.code = normalize_code(&coupon.code);

        self.write().coupons.insert(coupon.code.clone(), coupon);
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CouponRepository for InMemoryOrders {
    async fn find_by_code(&self, code: String) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.read().coupons.get(&code).cloned())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create_order(
        &self,
        order: Order,
        redemption: Option<CouponRedemption>,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.write();

        if state.orders.contains_key(&order.uuid) {
            return Err(RepositoryError::AlreadyExists);
        }

        if let Some(redemption) = redemption {
            let coupon = state
                .coupons
                .values_mut()
                .find(|coupon| coupon.uuid == redemption.coupon)
                .filter(|coupon| coupon.is_active)
                .ok_or(RepositoryError::Unavailable)?;

            if coupon.is_exhausted() {
                return Err(RepositoryError::Conflict);
            }

            coupon.uses = coupon.uses.saturating_add(1);
        }

        state.orders.insert(order.uuid, order.clone());

        Ok(order)
    }

    async fn get_order(&self, uuid: OrderUuid) -> Result<Order, RepositoryError> {
        self.read()
            .orders
            .get(&uuid)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_payment_status(
        &self,
        uuid: OrderUuid,
        status: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let mut state = self.write();

        let order = state
            .orders
            .get_mut(&uuid)
            .ok_or(RepositoryError::NotFound)?;

        order.payment_status = status;

        Ok(order.clone())
    }
}
