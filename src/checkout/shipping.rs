//! Shipping rates

use async_trait::async_trait;
use mockall::automock;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    checkout::{
        basket::Destination,
        lines::{OrderLine, subtotal},
    },
    config::{CheckoutConfig, ShippingRateConfig},
    money::{self, AmountError, Price},
};

/// A shipping option offered for a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRate {
    pub id: String,
    pub name: String,
    pub price: Price,
}

impl ShippingRate {
    /// Build a rate from configuration, priced in `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured price cannot be represented.
    pub fn from_config(
        config: &ShippingRateConfig,
        currency: &'static Currency,
    ) -> Result<Self, AmountError> {
        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            price: money::from_major(config.price, currency)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("shipping rates unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

#[automock]
#[async_trait]
pub trait ShippingRateProvider: Send + Sync {
    /// Offered rates for shipping `items` to `destination`, in preference
    /// order.
    async fn quote(
        &self,
        items: &[OrderLine],
        destination: &Destination,
    ) -> Result<Vec<ShippingRate>, ShippingError>;
}

/// The caller's chosen rate, or the first offered rate when the choice is
/// missing or not offered.
#[must_use]
pub fn select_rate<'a>(
    rates: &'a [ShippingRate],
    chosen: Option<&str>,
) -> Option<&'a ShippingRate> {
    chosen
        .and_then(|id| rates.iter().find(|rate| rate.id == id))
        .or_else(|| rates.first())
}

/// A fixed rate table, optionally free above a subtotal threshold.
#[derive(Debug, Clone)]
pub struct TableShippingRates {
    rates: Vec<ShippingRate>,
    free_threshold: Option<Price>,
}

impl TableShippingRates {
    #[must_use]
    pub fn new(rates: Vec<ShippingRate>, free_threshold: Option<Price>) -> Self {
        Self {
            rates,
            free_threshold,
        }
    }

    /// Build the table from the checkout configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured price cannot be represented.
    pub fn from_config(
        config: &CheckoutConfig,
        currency: &'static Currency,
    ) -> Result<Self, AmountError> {
        let rates = config
            .shipping_rates
            .iter()
            .map(|rate| ShippingRate::from_config(rate, currency))
            .collect::<Result<Vec<_>, _>>()?;

        let free_threshold = config
            .free_shipping_threshold
            .map(|threshold| money::from_major(threshold, currency))
            .transpose()?;

        Ok(Self::new(rates, free_threshold))
    }
}

#[async_trait]
impl ShippingRateProvider for TableShippingRates {
    async fn quote(
        &self,
        items: &[OrderLine],
        _destination: &Destination,
    ) -> Result<Vec<ShippingRate>, ShippingError> {
        let Some(threshold) = self.free_threshold else {
            return Ok(self.rates.clone());
        };

        let total = subtotal(items, threshold.currency())?;

        if total.to_minor_units() < threshold.to_minor_units() {
            return Ok(self.rates.clone());
        }

        Ok(self
            .rates
            .iter()
            .map(|rate| ShippingRate {
                price: money::zero(rate.price.currency()),
                ..rate.clone()
            })
            .collect())
    }
}
