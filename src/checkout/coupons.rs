//! Coupons
//!
//! Validation and pricing of discount codes against a cart subtotal.
//! Evaluating a coupon never changes its use count; uses are recorded when the
//! order is stored.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    money::{self, AmountError, Price},
    storage::RepositoryError,
    uuids::TypedUuid,
};

/// Coupon UUID
pub type CouponUuid = TypedUuid<Coupon>;

/// How a coupon's value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` percent of the subtotal.
    Percentage,

    /// `value` in major units of the subtotal's currency.
    FixedAmount,
}

/// Coupon Model
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    pub uuid: CouponUuid,

    /// Upper-case code.
    pub code: String,

    pub kind: DiscountKind,
    pub value: Decimal,

    /// Minimum subtotal, in major units of the base currency.
    pub min_amount: Option<Decimal>,

    pub max_uses: Option<u32>,
    pub uses: u32,

    /// Refuse the coupon for carts with catalog-discounted items.
    pub exclude_other_promotions: bool,

    pub is_active: bool,
}

impl Coupon {
    /// Whether the coupon has been used up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.uses >= max)
    }
}

/// Normalise a customer-entered code for lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon has no uses left")]
    Exhausted,

    #[error("cart subtotal is below the coupon minimum")]
    BelowMinimum,
}

impl CouponRejection {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Exhausted => "EXHAUSTED",
            Self::BelowMinimum => "BELOW_MINIMUM",
        }
    }
}

#[derive(Debug, Error)]
pub enum CouponError {
    #[error(transparent)]
    Rejected(#[from] CouponRejection),

    #[error("coupon storage error")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

#[automock]
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Look up a coupon by its normalised code.
    async fn find_by_code(&self, code: String) -> Result<Option<Coupon>, RepositoryError>;
}

/// A coupon that applies, with the discount it gives.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponEvaluation {
    pub coupon: Coupon,

    /// Always between zero and the subtotal.
    pub discount: Price,
}

/// Apply the coupon rules, in order, to `subtotal`.
///
/// # Errors
///
/// Returns the first rule the coupon fails, or an amount error.
pub fn discount_for(coupon: &Coupon, subtotal: Price) -> Result<Price, CouponError> {
    if !coupon.is_active {
        return Err(CouponRejection::NotFound.into());
    }

    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted.into());
    }

    if coupon
        .min_amount
        .is_some_and(|minimum| money::to_major(&subtotal) < minimum)
    {
        return Err(CouponRejection::BelowMinimum.into());
    }

    let raw = match coupon.kind {
        DiscountKind::Percentage => money::percent_of(&subtotal, coupon.value)?,
        DiscountKind::FixedAmount => money::from_major(coupon.value, subtotal.currency())?,
    };

    if raw.to_minor_units() <= 0 {
        return Ok(money::zero(subtotal.currency()));
    }

    Ok(money::min(raw, subtotal)?)
}

/// Looks coupons up and prices them.
#[derive(Clone)]
pub struct CouponEvaluator {
    coupons: Arc<dyn CouponRepository>,
}

impl std::fmt::Debug for CouponEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouponEvaluator").finish_non_exhaustive()
    }
}

impl CouponEvaluator {
    #[must_use]
    pub fn new(coupons: Arc<dyn CouponRepository>) -> Self {
        Self { coupons }
    }

    /// Evaluate `code` against `subtotal`.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::Rejected`] for unknown, inactive, exhausted or
    /// below-minimum coupons.
    pub async fn evaluate(
        &self,
        code: &str,
        subtotal: Price,
    ) -> Result<CouponEvaluation, CouponError> {
        let code = normalize_code(code);

        let Some(coupon) = self.coupons.find_by_code(code.clone()).await? else {
            debug!(code = %code, "unknown coupon");

            return Err(CouponRejection::NotFound.into());
        };

        let discount = discount_for(&coupon, subtotal)?;

        Ok(CouponEvaluation { coupon, discount })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::{Money, iso::PLN};
    use testresult::TestResult;

    use super::*;

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

    fn pln(minor: i64) -> Price {
        Money::from_minor(minor, PLN)
    }

    #[test]
    fn below_minimum_is_rejected() {
        let summer = Coupon {
            min_amount: Some(dec!(100)),
            ..coupon("SUMMER10", DiscountKind::Percentage, dec!(10))
        };

        let result = discount_for(&summer, pln(5_000));

        assert!(
            matches!(result, Err(CouponError::Rejected(CouponRejection::BelowMinimum))),
            "expected BelowMinimum, got {result:?}"
        );
    }

    #[test]
    fn minimum_is_inclusive() -> TestResult {
        let summer = Coupon {
            min_amount: Some(dec!(100)),
            ..coupon("SUMMER10", DiscountKind::Percentage, dec!(10))
        };

        assert_eq!(discount_for(&summer, pln(10_000))?, pln(1_000));

        Ok(())
    }

    #[test]
    fn fixed_amount_is_clamped_to_subtotal() -> TestResult {
        let flat = coupon("FLAT20", DiscountKind::FixedAmount, dec!(20));

        assert_eq!(discount_for(&flat, pln(1_500))?, pln(1_500));
        assert_eq!(discount_for(&flat, pln(5_000))?, pln(2_000));

        Ok(())
    }

    #[test]
    fn percentage_over_one_hundred_is_clamped() -> TestResult {
        let generous = coupon("ALL", DiscountKind::Percentage, dec!(150));

        assert_eq!(discount_for(&generous, pln(4_000))?, pln(4_000));

        Ok(())
    }

    #[test]
    fn negative_values_give_no_discount() -> TestResult {
        let broken = coupon("BROKEN", DiscountKind::FixedAmount, dec!(-5));

        assert_eq!(discount_for(&broken, pln(4_000))?, pln(0));

        Ok(())
    }

    #[test]
    fn exhaustion_is_checked_before_minimum() {
        let used = Coupon {
            max_uses: Some(3),
            uses: 3,
            min_amount: Some(dec!(100)),
            ..coupon("ONCE", DiscountKind::Percentage, dec!(10))
        };

        let result = discount_for(&used, pln(100));

        assert!(
            matches!(result, Err(CouponError::Rejected(CouponRejection::Exhausted))),
            "expected Exhausted, got {result:?}"
        );
    }

    #[test]
    fn inactive_coupons_look_unknown() {
        let inactive = Coupon {
            is_active: false,
            ..coupon("OLD", DiscountKind::Percentage, dec!(10))
        };

        let result = discount_for(&inactive, pln(10_000));

        assert!(
            matches!(result, Err(CouponError::Rejected(CouponRejection::NotFound))),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn codes_are_normalised_before_lookup() -> TestResult {
        let mut repository = MockCouponRepository::new();

        repository
            .expect_find_by_code()
            .once()
            .withf(|code| code == "SUMMER10")
            .return_once(|_| Ok(Some(coupon("SUMMER10", DiscountKind::Percentage, dec!(10)))));

        let evaluator = CouponEvaluator::new(Arc::new(repository));
        let evaluation = evaluator.evaluate("  summer10 ", pln(20_000)).await?;

        assert_eq!(evaluation.discount, pln(2_000));
        assert_eq!(evaluation.coupon.uses, 0, "evaluation must not count a use");

        Ok(())
    }

    #[tokio::test]
    async fn unknown_codes_are_not_found() {
        let mut repository = MockCouponRepository::new();

        repository.expect_find_by_code().once().return_once(|_| Ok(None));

        let evaluator = CouponEvaluator::new(Arc::new(repository));
        let result = evaluator.evaluate("NOPE", pln(20_000)).await;

        assert!(
            matches!(result, Err(CouponError::Rejected(CouponRejection::NotFound))),
            "expected NotFound, got {result:?}"
        );
    }
}
