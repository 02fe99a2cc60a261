//! Basket
//!
//! Client-submitted carts and their re-pricing against the catalog.

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::checkout::{
    catalog::{ProductCatalog, ProductId},
    errors::PricingError,
    lines::OrderLine,
};

/// A cart line as submitted by the client. Only `product` and `quantity` are
/// trusted; the claimed name and price are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CartItem {
    pub product: ProductId,

    #[serde(default)]
    pub claimed_name: Option<String>,

    #[serde(default)]
    pub claimed_price: Option<Decimal>,

    pub quantity: u32,
}

impl CartItem {
    /// A cart line with no client claims.
    #[must_use]
    pub fn new(product: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            claimed_name: None,
            claimed_price: None,
            quantity,
        }
    }
}

/// Where the order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Destination {
    pub city: String,
    pub postal_code: String,
}

/// Everything the pricing pipeline needs from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub coupon_code: Option<String>,
    pub destination: Destination,

    /// Preferred shipping rate id; the first offered rate is used when absent
    /// or unknown.
    pub shipping_method: Option<String>,

    /// Currency the order is charged in.
    pub currency: &'static Currency,
}

/// Replace every cart item with a line priced from the catalog.
///
/// # Errors
///
/// - [`PricingError::EmptyCart`]: no items.
/// - [`PricingError::InvalidQuantity`]: an item with quantity zero.
/// - [`PricingError::ProductNotFound`]: an item the catalog does not know.
/// - [`PricingError::ProductCurrency`]: a catalog price not in `currency`.
pub async fn reprice(
    catalog: &dyn ProductCatalog,
    items: &[CartItem],
    currency: &'static Currency,
) -> Result<Vec<OrderLine>, PricingError> {
    if items.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(PricingError::InvalidQuantity(item.product.clone()));
    }

    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let product = catalog
            .get_product(item.product.clone())
            .await
            .map_err(PricingError::Catalog)?
            .ok_or_else(|| PricingError::ProductNotFound(item.product.clone()))?;

        if product.unit_price.currency() != currency {
            return Err(PricingError::ProductCurrency(product.id));
        }

        lines.push(OrderLine::new(product, item.quantity));
    }

    Ok(lines)
}
