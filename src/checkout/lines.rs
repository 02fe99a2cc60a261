//! Order lines

use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};

use crate::{
    checkout::catalog::{CatalogProduct, ProductId},
    money::{self, AmountError, Price},
};

/// A line priced from the catalog. Names and prices here never come from the
/// client.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,

    /// The catalog discounts this product.
    pub on_promotion: bool,
}

impl OrderLine {
    /// A line for `quantity` units of a catalog product.
    #[must_use]
    pub fn new(product: CatalogProduct, quantity: u32) -> Self {
        Self {
            product: product.id,
            name: product.name,
            unit_price: product.unit_price,
            quantity,
            on_promotion: product.on_promotion,
        }
    }

    /// `unit_price * quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::OutOfRange`] on overflow.
    pub fn line_total(&self) -> Result<Price, AmountError> {
        self.unit_price
            .to_minor_units()
            .checked_mul(i64::from(self.quantity))
            .map(|minor| Money::from_minor(minor, self.unit_price.currency()))
            .ok_or(AmountError::OutOfRange)
    }

    /// The same line with its unit price converted into `target`, rounded up.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid rates or unrepresentable amounts.
    pub fn converted(&self, rate: Decimal, target: &'static Currency) -> Result<Self, AmountError> {
        Ok(Self {
            unit_price: money::convert_round_up(&self.unit_price, rate, target)?,
            ..self.clone()
        })
    }
}

/// Sum of line totals, in `currency`.
///
/// # Errors
///
/// Returns an error if a line is in another currency or a total overflows.
pub fn subtotal(lines: &[OrderLine], currency: &'static Currency) -> Result<Price, AmountError> {
    lines.iter().try_fold(money::zero(currency), |acc, line| {
        let total = line.line_total()?;

        if total.currency() != currency {
            return Err(MoneyError::CurrencyMismatch {
                expected: currency.iso_alpha_code,
                actual: total.currency().iso_alpha_code,
            }
            .into());
        }

        Ok(acc.add(total)?)
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::iso::{EUR, PLN};
    use testresult::TestResult;

    use super::*;

    fn line(product: &str, minor: i64, quantity: u32) -> OrderLine {
        OrderLine {
            product: product.into(),
            name: product.to_string(),
            unit_price: Money::from_minor(minor, PLN),
            quantity,
            on_promotion: false,
        }
    }

    #[test]
    fn subtotal_sums_quantities() -> TestResult {
        let lines = [line("mug", 3_500, 2), line("poster", 3_120, 1)];

        assert_eq!(subtotal(&lines, PLN)?, Money::from_minor(10_120, PLN));

        Ok(())
    }

    #[test]
    fn subtotal_of_no_lines_is_zero() -> TestResult {
        assert_eq!(subtotal(&[], PLN)?, Money::from_minor(0, PLN));

        Ok(())
    }

    #[test]
    fn subtotal_rejects_foreign_lines() {
        let mut foreign = line("mug", 100, 1);
        foreign.unit_price = Money::from_minor(100, EUR);

        assert!(matches!(
            subtotal(&[foreign], PLN),
            Err(AmountError::Money(MoneyError::CurrencyMismatch { .. }))
        ));
    }

    #[test]
    fn conversion_rounds_the_unit_price_up() -> TestResult {
        let converted = line("mug", 3_500, 2).converted(dec!(4.25), EUR)?;

        assert_eq!(converted.unit_price, Money::from_minor(900, EUR));
        assert_eq!(converted.line_total()?, Money::from_minor(1_800, EUR));

        Ok(())
    }
}
