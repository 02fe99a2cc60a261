//! Checkout pricing pipeline
//!
//! Turns an untrusted cart into a priced order. Steps run strictly in order:
//! re-price from the catalog, subtotal, shipping, coupon, currency conversion,
//! total. Client-supplied names and prices never reach the result.

use std::{fmt, sync::Arc};

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use tracing::{debug, warn};

use crate::{
    checkout::{
        basket::{self, CheckoutRequest},
        catalog::ProductCatalog,
        coupons::{Coupon, CouponEvaluator},
        errors::PricingError,
        exchange::{FallbackExchangeRates, RateQuote, RateSource},
        lines::{self, OrderLine},
        shipping::{ShippingRate, ShippingRateProvider, select_rate},
    },
    money::{self, Price},
};

/// The immutable result of pricing a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    lines: Vec<OrderLine>,
    subtotal: Price,
    discount: Price,
    shipping: ShippingRate,
    total: Price,
    currency: &'static Currency,
    exchange: Option<RateQuote>,
    coupon: Option<Coupon>,
}

impl PricedOrder {
    /// Catalog-priced lines, in the order currency.
    ///
    /// Converted unit prices are each rounded up on their own, while
    /// [`subtotal`](Self::subtotal) is converted once from the base amount, so
    /// converted lines can add up to more than the subtotal.
    #[must_use]
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    #[must_use]
    pub const fn subtotal(&self) -> Price {
        self.subtotal
    }

    #[must_use]
    pub const fn discount(&self) -> Price {
        self.discount
    }

    /// Selected shipping rate, priced in the order currency.
    #[must_use]
    pub const fn shipping(&self) -> &ShippingRate {
        &self.shipping
    }

    /// `subtotal - discount + shipping`.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.total
    }

    #[must_use]
    pub const fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Rate used for conversion, or `None` when charged in the base currency.
    #[must_use]
    pub fn exchange_rate(&self) -> Option<Decimal> {
        self.exchange.map(|quote| quote.rate)
    }

    /// Whether the rate was live or the fixed fallback.
    #[must_use]
    pub fn rate_source(&self) -> Option<RateSource> {
        self.exchange.map(|quote| quote.source)
    }

    /// The applied coupon, as it was when evaluated.
    #[must_use]
    pub const fn coupon(&self) -> Option<&Coupon> {
        self.coupon.as_ref()
    }

    /// Render the order as a text table.
    #[must_use]
    pub fn summary_table(&self) -> String {
        let mut builder = Builder::default();

        builder.push_record(["Product", "Qty", "Unit price", "Line total"]);

        for line in &self.lines {
            let line_total = line
                .line_total()
                .map_or_else(|_err| "-".to_string(), |total| total.to_string());

            builder.push_record([
                line.name.clone(),
                line.quantity.to_string(),
                line.unit_price.to_string(),
                line_total,
            ]);
        }

        let coupon = self
            .coupon
            .as_ref()
            .map_or_else(String::new, |coupon| coupon.code.clone());

        builder.push_record([
            String::new(),
            String::new(),
            "Subtotal".to_string(),
            self.subtotal.to_string(),
        ]);
        builder.push_record([
            coupon,
            String::new(),
            "Discount".to_string(),
            format!("-{}", self.discount),
        ]);
        builder.push_record([
            self.shipping.name.clone(),
            String::new(),
            "Shipping".to_string(),
            self.shipping.price.to_string(),
        ]);

        if let Some(quote) = self.exchange {
            builder.push_record([
                format!("{} rate", quote.source),
                String::new(),
                "Rate".to_string(),
                quote.rate.to_string(),
            ]);
        }

        builder.push_record([
            String::new(),
            String::new(),
            "Total".to_string(),
            self.total.to_string(),
        ]);

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(1..4), Alignment::right());

        table.to_string()
    }
}

/// Prices carts against the trusted catalog.
pub struct CheckoutPricingPipeline {
    catalog: Arc<dyn ProductCatalog>,
    coupons: CouponEvaluator,
    shipping: Arc<dyn ShippingRateProvider>,
    rates: FallbackExchangeRates,
    base_currency: &'static Currency,
    fallback_shipping: ShippingRate,
}

impl fmt::Debug for CheckoutPricingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutPricingPipeline")
            .field("coupons", &self.coupons)
            .field("rates", &self.rates)
            .field("base_currency", &self.base_currency.iso_alpha_code)
            .field("fallback_shipping", &self.fallback_shipping)
            .finish_non_exhaustive()
    }
}

impl CheckoutPricingPipeline {
    /// Create a pipeline. `fallback_shipping` is used when the shipping
    /// provider fails or offers nothing, and must be in `base_currency`.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        coupons: CouponEvaluator,
        shipping: Arc<dyn ShippingRateProvider>,
        rates: FallbackExchangeRates,
        base_currency: &'static Currency,
        fallback_shipping: ShippingRate,
    ) -> Self {
        Self {
            catalog,
            coupons,
            shipping,
            rates,
            base_currency,
            fallback_shipping,
        }
    }

    /// The currency catalog prices are in.
    #[must_use]
    pub const fn base_currency(&self) -> &'static Currency {
        self.base_currency
    }

    /// Price a cart.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] for empty carts, unknown products, invalid
    /// coupons, coupons conflicting with promoted products, or failures of
    /// the catalog or coupon store. Shipping and exchange rate failures are
    /// recovered with fallbacks.
    #[tracing::instrument(
        name = "checkout.price",
        skip(self, request),
        fields(items = request.items.len(), currency = request.currency.iso_alpha_code)
    )]
    pub async fn price(&self, request: &CheckoutRequest) -> Result<PricedOrder, PricingError> {
        let result = self.try_price(request).await;

        if let Err(err) = &result {
            if err.is_rejection() {
                debug!(code = err.code(), error = %err, "cart rejected");
            } else {
                warn!(code = err.code(), error = %err, "pricing failed");
            }
        }

        result
    }

    async fn try_price(&self, request: &CheckoutRequest) -> Result<PricedOrder, PricingError> {
        let base = self.base_currency;

        let lines = basket::reprice(self.catalog.as_ref(), &request.items, base).await?;
        let subtotal = lines::subtotal(&lines, base)?;

        let shipping = self.shipping_rate(&lines, request).await;

        let (discount, coupon) = match request.coupon_code.as_deref() {
            Some(code) => {
                let evaluation = self.coupons.evaluate(code, subtotal).await?;

                if evaluation.coupon.exclude_other_promotions
                    && lines.iter().any(|line| line.on_promotion)
                {
                    return Err(PricingError::CouponConflictsWithPromotion);
                }

                (evaluation.discount, Some(evaluation.coupon))
            }
            None => (money::zero(base), None),
        };

        let target = request.currency;

        if target == base {
            let total = money::order_total(subtotal, discount, shipping.price)?;

            return Ok(PricedOrder {
                lines,
                subtotal,
                discount,
                shipping,
                total,
                currency: base,
                exchange: None,
                coupon,
            });
        }

        let quote = self.rates.quote(base, target).await;
        let rate = quote.rate;

        let lines = lines
            .iter()
            .map(|line| line.converted(rate, target))
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = money::convert_round_up(&subtotal, rate, target)?;
        let discount = money::convert_round_up(&discount, rate, target)?;
        let shipping = ShippingRate {
            price: money::convert_round_up(&shipping.price, rate, target)?,
            ..shipping
        };

        let total = money::order_total(subtotal, discount, shipping.price)?;

        Ok(PricedOrder {
            lines,
            subtotal,
            discount,
            shipping,
            total,
            currency: target,
            exchange: Some(quote),
            coupon,
        })
    }

    async fn shipping_rate(&self, lines: &[OrderLine], request: &CheckoutRequest) -> ShippingRate {
        let rates = match self.shipping.quote(lines, &request.destination).await {
            Ok(rates) => rates,
            Err(err) => {
                warn!(error = %err, "shipping rates unavailable, using fallback rate");

                return self.fallback_shipping.clone();
            }
        };

        let offered = rates
            .iter()
            .filter(|rate| rate.price.currency() == self.base_currency)
            .cloned()
            .collect::<Vec<_>>();

        match select_rate(&offered, request.shipping_method.as_deref()) {
            Some(rate) => rate.clone(),
            None => {
                warn!("no shipping rates offered, using fallback rate");

                self.fallback_shipping.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::{
        Money,
        iso::{EUR, PLN},
    };
    use testresult::TestResult;

    use crate::checkout::{
        basket::{CartItem, Destination},
        catalog::{CatalogProduct, InMemoryCatalog},
        coupons::{CouponRepository, CouponUuid, DiscountKind, MockCouponRepository},
        errors::PricingError,
        exchange::{ExchangeRateError, MockExchangeRateProvider},
        orders::InMemoryOrders,
        shipping::{MockShippingRateProvider, ShippingError},
    };

    use super::*;

    fn pln(minor: i64) -> Price {
        Money::from_minor(minor, PLN)
    }

    fn product(id: &str, minor: i64, on_promotion: bool) -> CatalogProduct {
        CatalogProduct {
            id: id.into(),
            name: format!("Product {id}"),
            unit_price: pln(minor),
            on_promotion,
        }
    }

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::new([
            product("mug", 3_500, false),
            product("poster", 3_120, false),
            product("tote", 1_500, true),
        ]))
    }

    fn coupon(code: &str, kind: DiscountKind, value: Decimal) -> Coupon {
        Coupon {
            uuid: CouponUuid::new(),
            code: code.to_string(),
            kind,
            value,
            min_amount: None,
            max_uses: None,
            uses: 0,
            exclude_other_promotions: false,
            is_active: true,
        }
    }

    fn courier() -> ShippingRate {
        ShippingRate {
            id: "courier".to_string(),
            name: "Courier".to_string(),
            price: pln(1_800),
        }
    }

    fn fallback() -> ShippingRate {
        ShippingRate {
            id: "standard".to_string(),
            name: "Standard delivery".to_string(),
            price: pln(1_500),
        }
    }

    fn shipping_returning(rates: Vec<ShippingRate>) -> Arc<MockShippingRateProvider> {
        let mut shipping = MockShippingRateProvider::new();

        shipping.expect_quote().return_once(move |_, _| Ok(rates));

        Arc::new(shipping)
    }

    fn pipeline(
        coupons: Arc<dyn CouponRepository>,
        shipping: Arc<dyn ShippingRateProvider>,
        rates: FallbackExchangeRates,
    ) -> CheckoutPricingPipeline {
        CheckoutPricingPipeline::new(
            catalog(),
            CouponEvaluator::new(coupons),
            shipping,
            rates,
            PLN,
            fallback(),
        )
    }

    fn request(items: Vec<CartItem>, coupon_code: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            coupon_code: coupon_code.map(str::to_string),
            destination: Destination {
                city: "Kraków".to_string(),
                postal_code: "30-001".to_string(),
            },
            shipping_method: None,
            currency: PLN,
        }
    }

    #[tokio::test]
    async fn base_currency_order_is_not_rounded_or_converted() -> TestResult {
        let pipeline = pipeline(
            Arc::new(InMemoryOrders::default()),
            shipping_returning(vec![courier()]),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let priced = pipeline
            .price(&request(vec![CartItem::new("mug", 2), CartItem::new("poster", 1)], None))
            .await?;

        assert_eq!(priced.subtotal(), pln(10_120));
        assert_eq!(priced.discount(), pln(0));
        assert_eq!(priced.shipping().price, pln(1_800));
        assert_eq!(priced.total(), pln(11_920));
        assert_eq!(priced.exchange_rate(), None);
        assert_eq!(priced.coupon(), None);

        Ok(())
    }

    #[tokio::test]
    async fn euro_orders_use_fallback_rate_and_round_up() -> TestResult {
        let mut provider = MockExchangeRateProvider::new();

        provider
            .expect_get_rate()
            .once()
            .return_once(|_, _| Err(ExchangeRateError::MissingRate("EUR")));

        let pipeline = pipeline(
            Arc::new(InMemoryOrders::default()),
            shipping_returning(vec![courier()]),
            FallbackExchangeRates::new(Arc::new(provider), dec!(4.25)),
        );

        let priced = pipeline
            .price(&CheckoutRequest {
                currency: EUR,
                ..request(vec![CartItem::new("mug", 2), CartItem::new("poster", 1)], None)
            })
            .await?;

        assert_eq!(priced.subtotal(), Money::from_minor(2_400, EUR));
        assert_eq!(priced.shipping().price, Money::from_minor(500, EUR));
        assert_eq!(priced.total(), Money::from_minor(2_900, EUR));
        assert_eq!(priced.exchange_rate(), Some(dec!(4.25)));
        assert_eq!(priced.rate_source(), Some(RateSource::Fallback));
        assert_eq!(
            priced.lines().iter().map(|line| line.unit_price).collect::<Vec<_>>(),
            vec![Money::from_minor(900, EUR), Money::from_minor(800, EUR)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn flat_coupon_is_clamped_and_total_stays_consistent() -> TestResult {
        let orders = InMemoryOrders::new([coupon("FLAT20", DiscountKind::FixedAmount, dec!(20))]);

        let pipeline = pipeline(
            Arc::new(orders),
            shipping_returning(vec![courier()]),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let priced = pipeline
            .price(&request(vec![CartItem::new("tote", 1)], Some("flat20")))
            .await?;

        assert_eq!(priced.discount(), pln(1_500));
        assert_eq!(priced.total(), pln(1_800));
        assert_eq!(priced.coupon().map(|c| c.code.as_str()), Some("FLAT20"));

        Ok(())
    }

    #[tokio::test]
    async fn exclusive_coupon_conflicts_with_promoted_products() {
        let exclusive = Coupon {
            exclude_other_promotions: true,
            ..coupon("SOLO", DiscountKind::Percentage, dec!(10))
        };

        let pipeline = pipeline(
            Arc::new(InMemoryOrders::new([exclusive])),
            shipping_returning(vec![courier()]),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let result = pipeline
            .price(&request(vec![CartItem::new("mug", 1), CartItem::new("tote", 1)], Some("SOLO")))
            .await;

        assert!(
            matches!(result, Err(PricingError::CouponConflictsWithPromotion)),
            "expected CouponConflictsWithPromotion, got {result:?}"
        );
    }

    #[tokio::test]
    async fn unknown_product_stops_before_coupons_and_shipping() {
        let mut coupons = MockCouponRepository::new();
        let mut shipping = MockShippingRateProvider::new();

        coupons.expect_find_by_code().never();
        shipping.expect_quote().never();

        let pipeline = pipeline(
            Arc::new(coupons),
            Arc::new(shipping),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let result = pipeline
            .price(&request(vec![CartItem::new("mug", 1), CartItem::new("ghost", 1)], Some("ANY")))
            .await;

        assert!(
            matches!(&result, Err(PricingError::ProductNotFound(id)) if id.as_str() == "ghost"),
            "expected ProductNotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn shipping_failure_uses_fallback_rate() -> TestResult {
        let mut shipping = MockShippingRateProvider::new();

        shipping
            .expect_quote()
            .once()
            .return_once(|_, _| Err(ShippingError::Unavailable("carrier API down".to_string())));

        let pipeline = pipeline(
            Arc::new(InMemoryOrders::default()),
            Arc::new(shipping),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let priced = pipeline.price(&request(vec![CartItem::new("mug", 1)], None)).await?;

        assert_eq!(priced.shipping(), &fallback());
        assert_eq!(priced.total(), pln(5_000));

        Ok(())
    }

    #[tokio::test]
    async fn chosen_shipping_method_is_honoured() -> TestResult {
        let locker = ShippingRate {
            id: "locker".to_string(),
            name: "Parcel locker".to_string(),
            price: pln(1_100),
        };

        let pipeline = pipeline(
            Arc::new(InMemoryOrders::default()),
            shipping_returning(vec![courier(), locker.clone()]),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let priced = pipeline
            .price(&CheckoutRequest {
                shipping_method: Some("locker".to_string()),
                ..request(vec![CartItem::new("mug", 1)], None)
            })
            .await?;

        assert_eq!(priced.shipping(), &locker);

        Ok(())
    }

    #[tokio::test]
    async fn summary_table_lists_lines_and_total() -> TestResult {
        let pipeline = pipeline(
            Arc::new(InMemoryOrders::default()),
            shipping_returning(vec![courier()]),
            FallbackExchangeRates::offline(dec!(4.25)),
        );

        let priced = pipeline.price(&request(vec![CartItem::new("mug", 2)], None)).await?;
        let table = priced.summary_table();

        assert!(table.contains("Product mug"), "missing line in:\n{table}");
        assert!(table.contains("Total"), "missing total in:\n{table}");

        Ok(())
    }
}
