//! Money
//!
//! Monetary values are `rusty_money` amounts in ISO currencies, stored and
//! compared in minor units. Conversion between currencies always rounds up to
//! whole major units of the target currency.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Findable, Money, MoneyError, iso::Currency};
use thiserror::Error;

/// A monetary amount in an ISO currency.
pub type Price = Money<'static, Currency>;

/// Errors raised while building or converting monetary amounts.
#[derive(Debug, Error)]
pub enum AmountError {
    /// The amount text could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The currency code is not a known ISO currency.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// The amount does not fit in minor units.
    #[error("amount out of range")]
    OutOfRange,

    /// An exchange rate must be strictly positive.
    #[error("invalid exchange rate: {0}")]
    InvalidRate(Decimal),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Look up an ISO currency by its alphabetic code, case-insensitively.
///
/// # Errors
///
/// Returns [`AmountError::UnknownCurrency`] when the code is not an ISO currency.
pub fn find_currency(code: &str) -> Result<&'static Currency, AmountError> {
    Currency::find(&code.trim().to_ascii_uppercase())
        .ok_or_else(|| AmountError::UnknownCurrency(code.to_string()))
}

/// Zero in the given currency.
#[must_use]
pub fn zero(currency: &'static Currency) -> Price {
    Money::from_minor(0, currency)
}

/// Build an amount from a decimal number of major units, rounding to the
/// currency's minor unit.
///
/// # Errors
///
/// Returns [`AmountError::OutOfRange`] if the amount cannot be represented.
pub fn from_major(amount: Decimal, currency: &'static Currency) -> Result<Price, AmountError> {
    let minor = amount
        .checked_mul(minor_factor(currency))
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .ok_or(AmountError::OutOfRange)?;

    Ok(Money::from_minor(minor, currency))
}

/// The amount expressed in major units.
#[must_use]
pub fn to_major(price: &Price) -> Decimal {
    Decimal::new(price.to_minor_units(), price.currency().exponent)
}

/// Parse a price string such as `"12.50 PLN"`.
///
/// # Errors
///
/// Returns an error if the string is not `AMOUNT CURRENCY`, the amount is not a
/// decimal number, or the currency code is unknown.
pub fn parse_price(s: &str) -> Result<Price, AmountError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AmountError::InvalidAmount(format!(
            "expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|error| AmountError::InvalidAmount(format!("{s}: {error}")))?;

    from_major(amount, find_currency(code)?)
}

/// Convert `price` into `target` at `rate` units of the source currency per
/// unit of the target, rounding up to whole major units of the target.
///
/// # Errors
///
/// Returns [`AmountError::InvalidRate`] for non-positive rates and
/// [`AmountError::OutOfRange`] if the result cannot be represented.
pub fn convert_round_up(
    price: &Price,
    rate: Decimal,
    target: &'static Currency,
) -> Result<Price, AmountError> {
    if rate <= Decimal::ZERO {
        return Err(AmountError::InvalidRate(rate));
    }

    let converted = to_major(price)
        .checked_div(rate)
        .ok_or(AmountError::OutOfRange)?
        .ceil();

    from_major(converted, target)
}

/// `percent` percent of `price`, rounded half away from zero to minor units.
///
/// # Errors
///
/// Returns [`AmountError::OutOfRange`] if the calculation overflows.
pub fn percent_of(price: &Price, percent: Decimal) -> Result<Price, AmountError> {
    let applied = Decimal::from(price.to_minor_units())
        .checked_mul(percent)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(AmountError::OutOfRange)?;

    let minor = applied
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmountError::OutOfRange)?;

    Ok(Money::from_minor(minor, price.currency()))
}

/// The smaller of two amounts in the same currency.
///
/// # Errors
///
/// Returns [`AmountError::Money`] on a currency mismatch.
pub fn min(a: Price, b: Price) -> Result<Price, AmountError> {
    if a.currency() != b.currency() {
        return Err(MoneyError::CurrencyMismatch {
            expected: a.currency().iso_alpha_code,
            actual: b.currency().iso_alpha_code,
        }
        .into());
    }

    Ok(if a.to_minor_units() <= b.to_minor_units() {
        a
    } else {
        b
    })
}

/// `subtotal - discount + shipping`, all in one currency.
///
/// # Errors
///
/// Returns [`AmountError::Money`] on a currency mismatch.
pub fn order_total(
    subtotal: Price,
    discount: Price,
    shipping: Price,
) -> Result<Price, AmountError> {
    Ok(subtotal.sub(discount)?.add(shipping)?)
}

fn minor_factor(currency: &Currency) -> Decimal {
    Decimal::from(10_i64.pow(currency.exponent))
}
