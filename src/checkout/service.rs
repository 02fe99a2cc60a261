//! Checkout service
//!
//! Prices carts and places priced orders. Once an order is stored it counts
//! as placed: payment initialisation and notifications can only degrade the
//! response, never fail it.

use std::{fmt, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::{
    checkout::{
        basket::CheckoutRequest,
        errors::{CheckoutError, PricingError},
        orders::{
            CouponRedemption, Order, OrderDocument, OrderRepository, OrderStatus, OrderUuid,
            PaymentStatus,
        },
        payments::{PaymentError, PaymentMethod, PaymentProvider, PaymentRequest},
        pipeline::{CheckoutPricingPipeline, PricedOrder},
    },
    clock::Clock,
    config::CheckoutConfig,
    contact::CustomerInfo,
    notifications::{Notification, NotificationDispatcher},
};

/// Customer details supplied when placing an order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub document: OrderDocument,
}

/// Where to send the customer after placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub order: OrderUuid,
    pub redirect_url: String,
    pub payment_status: PaymentStatus,
}

/// Payment and confirmation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Plain confirmation page, used when no payment redirect is available.
    pub confirmation_url: String,

    /// Upper bound on waiting for the payment provider.
    pub payment_timeout: Duration,
}

impl From<&CheckoutConfig> for CheckoutSettings {
    fn from(config: &CheckoutConfig) -> Self {
        Self {
            confirmation_url: config.confirmation_url.clone(),
            payment_timeout: Duration::from_secs(config.payment_timeout_seconds),
        }
    }
}

/// Entry point for pricing and placing orders.
pub struct CheckoutService {
    pipeline: CheckoutPricingPipeline,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentProvider>,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    settings: CheckoutSettings,
}

impl fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutService")
            .field("pipeline", &self.pipeline)
            .field("notifications", &self.notifications)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        pipeline: CheckoutPricingPipeline,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            pipeline,
            orders,
            payments,
            notifications: NotificationDispatcher::new(),
            clock,
            settings,
        }
    }

    /// Dispatch order notifications through `notifications`.
    #[must_use]
    pub fn with_notifications(mut self, notifications: NotificationDispatcher) -> Self {
        self.notifications = notifications;
        self
    }

    /// Price a cart without placing it.
    ///
    /// # Errors
    ///
    /// See [`CheckoutPricingPipeline::price`].
    pub async fn price_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<PricedOrder, PricingError> {
        self.pipeline.price(request).await
    }

    /// Store a priced order, record its coupon use and start payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Coupon`] if the coupon ran out after pricing,
    /// or a storage error. Payment and notification failures are logged and
    /// never returned.
    #[tracing::instrument(
        name = "checkout.complete",
        skip(self, priced, details),
        fields(total = %priced.total(), payment_method = ?details.payment_method)
    )]
    pub async fn complete_checkout(
        &self,
        priced: PricedOrder,
        details: PlaceOrder,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let redemption = priced.coupon().map(|coupon| CouponRedemption {
            coupon: coupon.uuid,
        });

        let payment_status = if details.payment_method.is_online() {
            PaymentStatus::Initiated
        } else {
            PaymentStatus::AwaitingPayment
        };

        let order = Order {
            uuid: OrderUuid::new(),
            lines: priced.lines().to_vec(),
            subtotal: priced.subtotal(),
            discount: priced.discount(),
            shipping: priced.shipping().price,
            shipping_method: priced.shipping().id.clone(),
            total: priced.total(),
            currency: priced.currency().iso_alpha_code,
            exchange_rate: priced.exchange_rate(),
            coupon: redemption.map(|redemption| redemption.coupon),
            customer: details.customer,
            document: details.document,
            payment_method: details.payment_method,
            status: OrderStatus::Placed,
            payment_status,
            created_at: self.clock.timestamp(),
        };

        let order = match self.orders.create_order(order, redemption).await {
            Ok(order) => order,
            Err(err) => {
                let err = CheckoutError::from(err);

                warn!(code = err.code(), error = %err, "order not placed");

                return Err(err);
            }
        };

        info!(order = %order.uuid, total = %order.total, "order placed");

        let (redirect_url, payment_status) = if order.payment_method.is_online() {
            self.start_payment(&order).await
        } else {
            (self.settings.confirmation_url.clone(), order.payment_status)
        };

        self.notifications.dispatch(Notification::OrderPlaced {
            order: order.uuid,
            total: order.total,
            email: order.customer.email.clone(),
        });

        Ok(CheckoutOutcome {
            order: order.uuid,
            redirect_url,
            payment_status,
        })
    }

    async fn start_payment(&self, order: &Order) -> (String, PaymentStatus) {
        let request = PaymentRequest {
            order: order.uuid,
            total: order.total,
            payer_email: order.customer.email.clone(),
            description: format!("Order {}", order.uuid),
        };

        let result = timeout(
            self.settings.payment_timeout,
            self.payments.create_transaction(request),
        )
        .await
        .unwrap_or(Err(PaymentError::Timeout));

        match result {
            Ok(transaction) => {
                info!(
                    order = %order.uuid,
                    transaction = %transaction.transaction_id,
                    "payment initiated"
                );

                (transaction.redirect_url, PaymentStatus::Initiated)
            }
            Err(err) => {
                warn!(
                    order = %order.uuid,
                    error = %err,
                    "payment initialisation failed, sending to confirmation page"
                );

                if let Err(err) = self
                    .orders
                    .set_payment_status(order.uuid, PaymentStatus::Failed)
                    .await
                {
                    error!(order = %order.uuid, error = %err, "could not record failed payment");
                }

                (self.settings.confirmation_url.clone(), PaymentStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::{Money, iso::PLN};
    use testresult::TestResult;

    use crate::{
        checkout::{
            basket::{CartItem, Destination},
            catalog::{CatalogProduct, InMemoryCatalog},
            coupons::{Coupon, CouponEvaluator, CouponRepository, CouponUuid, DiscountKind},
            exchange::FallbackExchangeRates,
            orders::{InMemoryOrders, MockOrderRepository},
            payments::{MockPaymentProvider, PaymentTransaction},
            shipping::{ShippingRate, TableShippingRates},
        },
        clock::FixedClock,
        notifications::MockNotifier,
        storage::RepositoryError,
    };

    use jiff::civil::date;

    use super::*;

    fn standard() -> ShippingRate {
        ShippingRate {
            id: "standard".to_string(),
            name: "Standard delivery".to_string(),
            price: Money::from_minor(1_500, PLN),
        }
    }

    fn pipeline(coupons: Arc<dyn CouponRepository>) -> CheckoutPricingPipeline {
        let catalog = InMemoryCatalog::new([CatalogProduct {
            id: "mug".into(),
            name: "Studio mug".to_string(),
            unit_price: Money::from_minor(3_500, PLN),
            on_promotion: false,
        }]);

        CheckoutPricingPipeline::new(
            Arc::new(catalog),
            CouponEvaluator::new(coupons),
            Arc::new(TableShippingRates::new(vec![standard()], None)),
            FallbackExchangeRates::offline(dec!(4.25)),
            PLN,
            standard(),
        )
    }

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            confirmation_url: "https://shop.example/confirmed".to_string(),
            payment_timeout: Duration::from_millis(50),
        }
    }

    fn service(
        coupons: Arc<dyn CouponRepository>,
        orders: Arc<dyn OrderRepository>,
        payments: MockPaymentProvider,
    ) -> CheckoutService {
        CheckoutService::new(
            pipeline(coupons),
            orders,
            Arc::new(payments),
            Arc::new(FixedClock::new(date(2026, 7, 1).at(12, 0, 0, 0))),
            settings(),
        )
    }

    fn cart(coupon_code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            items: vec![CartItem::new("mug", 2)],
            coupon_code: coupon_code.map(str::to_string),
            destination: Destination::default(),
            shipping_method: None,
            currency: PLN,
        }
    }

    fn details(payment_method: PaymentMethod) -> PlaceOrder {
        PlaceOrder {
            customer: CustomerInfo::new("Ada", "ada@example.com"),
            payment_method,
            document: OrderDocument::Receipt,
        }
    }

    #[tokio::test]
    async fn online_payment_redirects_to_provider() -> TestResult {
        let store = Arc::new(InMemoryOrders::default());
        let mut payments = MockPaymentProvider::new();

        payments
            .expect_create_transaction()
            .once()
            .withf(|request| request.total == Money::from_minor(8_500, PLN))
            .return_once(|_| {
                Ok(PaymentTransaction {
                    transaction_id: "tx-1".to_string(),
                    redirect_url: "https://pay.example/tx-1".to_string(),
                })
            });

        let service = service(store.clone(), store.clone(), payments);
        let priced = service.price_checkout(&cart(None)).await?;
        let outcome = service.complete_checkout(priced, details(PaymentMethod::Online)).await?;

        assert_eq!(outcome.redirect_url, "https://pay.example/tx-1");
        assert_eq!(outcome.payment_status, PaymentStatus::Initiated);

        let stored = store.get_order(outcome.order).await?;

        assert_eq!(stored.total, Money::from_minor(8_500, PLN));
        assert_eq!(stored.subtotal, Money::from_minor(7_000, PLN));

        Ok(())
    }

    #[tokio::test]
    async fn payment_failure_falls_back_to_confirmation_page() -> TestResult {
        let store = Arc::new(InMemoryOrders::default());
        let mut payments = MockPaymentProvider::new();

        payments
            .expect_create_transaction()
            .once()
            .return_once(|_| Err(PaymentError::Unavailable("gateway down".to_string())));

        let service = service(store.clone(), store.clone(), payments);
        let priced = service.price_checkout(&cart(None)).await?;
        let outcome = service.complete_checkout(priced, details(PaymentMethod::Online)).await?;

        assert_eq!(outcome.redirect_url, "https://shop.example/confirmed");
        assert_eq!(outcome.payment_status, PaymentStatus::Failed);
        assert_eq!(
            store.get_order(outcome.order).await?.payment_status,
            PaymentStatus::Failed
        );

        Ok(())
    }

    #[tokio::test]
    async fn offline_methods_skip_the_provider() -> TestResult {
        let store = Arc::new(InMemoryOrders::default());
        let mut payments = MockPaymentProvider::new();

        payments.expect_create_transaction().never();

        let service = service(store.clone(), store.clone(), payments);
        let priced = service.price_checkout(&cart(None)).await?;
        let outcome = service
            .complete_checkout(priced, details(PaymentMethod::BankTransfer))
            .await?;

        assert_eq!(outcome.redirect_url, "https://shop.example/confirmed");
        assert_eq!(outcome.payment_status, PaymentStatus::AwaitingPayment);

        Ok(())
    }

    #[tokio::test]
    async fn coupon_exhausted_after_pricing_rejects_order() -> TestResult {
        let once = Coupon {
            uuid: CouponUuid::new(),
            code: "ONCE".to_string(),
            kind: DiscountKind::FixedAmount,
            value: dec!(5),
            min_amount: None,
            max_uses: Some(1),
            uses: 0,
            exclude_other_promotions: false,
            is_active: true,
        };

        let store = Arc::new(InMemoryOrders::new([once]));
        let mut payments = MockPaymentProvider::new();

        payments.expect_create_transaction().never();

        let service = service(store.clone(), store.clone(), payments);

        let first = service.price_checkout(&cart(Some("ONCE"))).await?;
        let second = service.price_checkout(&cart(Some("ONCE"))).await?;

        service
            .complete_checkout(first, details(PaymentMethod::OnPickup))
            .await?;

        let result = service
            .complete_checkout(second, details(PaymentMethod::OnPickup))
            .await;

        assert!(
            matches!(result, Err(CheckoutError::Coupon(_))),
            "expected exhausted coupon, got {result:?}"
        );
        assert_eq!(store.order_count(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn storage_failure_skips_payment_and_notifications() -> TestResult {
        let coupons = Arc::new(InMemoryOrders::default());
        let mut orders = MockOrderRepository::new();
        let mut payments = MockPaymentProvider::new();
        let mut notifier = MockNotifier::new();

        orders
            .expect_create_order()
            .once()
            .return_once(|_, _| Err(RepositoryError::Storage("disk full".into())));
        payments.expect_create_transaction().never();
        notifier.expect_notify().never();
        notifier.expect_name().return_const("mock");

        let service = service(coupons, Arc::new(orders), payments)
            .with_notifications(NotificationDispatcher::new().with(Arc::new(notifier)));

        let priced = service.price_checkout(&cart(None)).await?;
        let result = service.complete_checkout(priced, details(PaymentMethod::Online)).await;

        assert!(
            matches!(result, Err(CheckoutError::Repository(_))),
            "expected storage error, got {result:?}"
        );

        Ok(())
    }
}
