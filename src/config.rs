//! Engine configuration
//!
//! A single versioned configuration object is loaded once (usually from YAML)
//! and handed to the engines. Nothing in the crate reads settings from
//! ambient global state.

use std::{fs, path::Path};

use jiff::{civil::Time, tz::TimeZone};
use rust_decimal::{Decimal, dec};
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    bookings::{models::BookingType, occupancy::OccupancyModel},
    money::{self, AmountError, Price},
};

/// Current configuration schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The configuration was written for a different schema version.
    #[error("unsupported configuration version {found}")]
    UnsupportedVersion {
        /// Version declared by the file
        found: u32,
    },

    /// A value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A monetary value could not be built.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// The venue time zone is unknown.
    #[error("unknown time zone: {0}")]
    TimeZone(#[source] jiff::Error),
}

/// Root configuration object.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Schema version.
    pub version: u32,

    /// Venue and slot settings.
    pub venue: VenueConfig,

    /// Occupancy model settings.
    pub occupancy: OccupancyConfig,

    /// Checkout settings.
    pub checkout: CheckoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            venue: VenueConfig::default(),
            occupancy: OccupancyConfig::default(),
            checkout: CheckoutConfig::default(),
        }
    }
}

/// Venue opening hours, slot grid and ticket prices.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VenueConfig {
    /// IANA time zone the venue operates in.
    pub time_zone: String,

    /// Daily opening hours used when generating slots.
    pub business_hours: BusinessHours,

    /// Minutes between generated slots.
    pub slot_interval_minutes: u32,

    /// Capacity given to newly generated slots.
    pub default_capacity: u32,

    /// Per-person prices by booking type, in the base currency.
    pub prices: TicketPrices,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            business_hours: BusinessHours::default(),
            slot_interval_minutes: 15,
            default_capacity: 92,
            prices: TicketPrices::default(),
        }
    }
}

/// Opening (inclusive) and closing (exclusive) wall-clock times.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusinessHours {
    /// First slot start time.
    pub open: Time,

    /// No slot starts at or after this time.
    pub close: Time,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: Time::constant(10, 0, 0, 0),
            close: Time::constant(18, 0, 0, 0),
        }
    }
}

/// Per-person ticket prices in major units of the base currency.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketPrices {
    /// Sightseeing visit price.
    pub sightseeing: Decimal,

    /// Workshop price.
    pub workshop: Decimal,
}

impl Default for TicketPrices {
    fn default() -> Self {
        Self {
            sightseeing: dec!(25),
            workshop: dec!(60),
        }
    }
}

/// How bookings consume slot capacity.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OccupancyConfig {
    /// Canonical occupancy model for every surface.
    pub model: OccupancyModel,

    /// Workshop duration under the interval model.
    pub workshop_minutes: u32,

    /// Sightseeing duration under the interval model.
    pub sightseeing_minutes: u32,

    /// Offset of the extra slot a workshop occupies under the spillover model.
    pub spillover_minutes: u32,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            model: OccupancyModel::ShadowSpillover,
            workshop_minutes: 80,
            sightseeing_minutes: 30,
            spillover_minutes: 60,
        }
    }
}

/// A fixed shipping option.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShippingRateConfig {
    /// Stable method identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Price in major units of the base currency.
    pub price: Decimal,
}

/// Checkout pricing and side-effect settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Currency catalog prices are denominated in.
    pub base_currency: String,

    /// Rate used when no live rate can be fetched.
    pub fallback_exchange_rate: Decimal,

    /// Base URL of the exchange-rate table API.
    pub exchange_rate_url: String,

    /// Timeout for a live exchange-rate fetch.
    pub exchange_rate_timeout_seconds: u64,

    /// Timeout for creating a payment transaction.
    pub payment_timeout_seconds: u64,

    /// Where customers land when no payment redirect is available.
    pub confirmation_url: String,

    /// Shipping option used when the shipping collaborator fails.
    pub fallback_shipping: ShippingRateConfig,

    /// Fixed shipping rate table, in order of preference.
    pub shipping_rates: Vec<ShippingRateConfig>,

    /// Subtotal from which the fixed table ships for free.
    pub free_shipping_threshold: Option<Decimal>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            base_currency: "PLN".to_string(),
            fallback_exchange_rate: dec!(4.25),
            exchange_rate_url: "https://api.nbp.pl/api/exchangerates/rates/a".to_string(),
            exchange_rate_timeout_seconds: 5,
            payment_timeout_seconds: 10,
            confirmation_url: "https://example.invalid/order/confirmed".to_string(),
            fallback_shipping: ShippingRateConfig {
                id: "standard".to_string(),
                name: "Standard delivery".to_string(),
                price: dec!(15),
            },
            shipping_rates: Vec::new(),
            free_shipping_threshold: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or any value is unusable.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_norway::from_str(contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }

    /// Check invariants the engines rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
            });
        }

        let venue = &self.venue;

        if venue.slot_interval_minutes == 0 {
            return Err(invalid("venue.slot_interval_minutes must be positive"));
        }

        if venue.default_capacity == 0 {
            return Err(invalid("venue.default_capacity must be positive"));
        }

        if venue.business_hours.close <= venue.business_hours.open {
            return Err(invalid("venue.business_hours.close must be after open"));
        }

        let occupancy = &self.occupancy;

        if occupancy.workshop_minutes == 0 || occupancy.sightseeing_minutes == 0 {
            return Err(invalid("occupancy durations must be positive"));
        }

        if self.checkout.fallback_exchange_rate <= Decimal::ZERO {
            return Err(invalid("checkout.fallback_exchange_rate must be positive"));
        }

        self.base_currency()?;
        self.time_zone()?;

        Ok(())
    }

    /// The currency catalog prices are denominated in.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured code is not an ISO currency.
    pub fn base_currency(&self) -> Result<&'static Currency, ConfigError> {
        Ok(money::find_currency(&self.checkout.base_currency)?)
    }

    /// The venue time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone is not in the time zone database.
    pub fn time_zone(&self) -> Result<TimeZone, ConfigError> {
        if self.venue.time_zone.eq_ignore_ascii_case("UTC") {
            return Ok(TimeZone::UTC);
        }

        TimeZone::get(&self.venue.time_zone).map_err(ConfigError::TimeZone)
    }

    /// Per-person price for a booking type.
    ///
    /// # Errors
    ///
    /// Returns an error if the base currency is invalid or the price overflows.
    pub fn ticket_price(&self, kind: BookingType) -> Result<Price, ConfigError> {
        let amount = match kind {
            BookingType::Sightseeing => self.venue.prices.sightseeing,
            BookingType::Workshop => self.venue.prices.workshop,
        };

        Ok(money::from_major(amount, self.base_currency()?)?)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::{Money, iso::PLN};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn defaults_are_valid() -> TestResult {
        let config = EngineConfig::default();

        config.validate()?;

        assert_eq!(config.checkout.fallback_exchange_rate, dec!(4.25));
        assert_eq!(config.venue.slot_interval_minutes, 15);
        assert_eq!(config.occupancy.model, OccupancyModel::ShadowSpillover);

        Ok(())
    }

    #[test]
    fn yaml_overrides_only_given_fields() -> TestResult {
        let config = EngineConfig::from_yaml_str(
            "
version: 1
venue:
  default_capacity: 40
occupancy:
  model: interval_overlap
",
        )?;

        assert_eq!(config.venue.default_capacity, 40);
        assert_eq!(config.venue.slot_interval_minutes, 15);
        assert_eq!(config.occupancy.model, OccupancyModel::IntervalOverlap);

        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = EngineConfig::from_yaml_str("venue:\n  capacity: 3\n");

        assert!(
            matches!(result, Err(ConfigError::Yaml(_))),
            "expected Yaml error, got {result:?}"
        );
    }

    #[test]
    fn non_positive_fallback_rate_is_rejected() {
        let result = EngineConfig::from_yaml_str("checkout:\n  fallback_exchange_rate: 0\n");

        assert!(
            matches!(result, Err(ConfigError::Invalid(_))),
            "expected Invalid, got {result:?}"
        );
    }

    #[test]
    fn other_versions_are_rejected() {
        let result = EngineConfig::from_yaml_str("version: 2\n");

        assert!(
            matches!(result, Err(ConfigError::UnsupportedVersion { found: 2 })),
            "expected UnsupportedVersion, got {result:?}"
        );
    }

    #[test]
    fn unknown_base_currency_is_rejected() {
        let result = EngineConfig::from_yaml_str("checkout:\n  base_currency: ZZZ\n");

        assert!(
            matches!(result, Err(ConfigError::Amount(AmountError::UnknownCurrency(_)))),
            "expected UnknownCurrency, got {result:?}"
        );
    }

    #[test]
    fn ticket_price_uses_base_currency() -> TestResult {
        let config = EngineConfig::default();

        assert_eq!(
            config.ticket_price(BookingType::Workshop)?,
            Money::from_minor(6_000, PLN)
        );

        Ok(())
    }

    #[test]
    fn from_path_reads_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;

        writeln!(file, "venue:\n  slot_interval_minutes: 30")?;

        let config = EngineConfig::from_path(file.path())?;

        assert_eq!(config.venue.slot_interval_minutes, 30);

        Ok(())
    }
}
