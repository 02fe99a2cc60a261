//! Checkout errors.

use thiserror::Error;

use crate::{
    checkout::{
        catalog::ProductId,
        coupons::{CouponError, CouponRejection},
    },
    money::AmountError,
    storage::RepositoryError,
};

/// Why a cart could not be priced.
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("quantity of {0} must be positive")]
    InvalidQuantity(ProductId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The catalog prices a product in a currency other than the base.
    #[error("product {0} is not priced in the base currency")]
    ProductCurrency(ProductId),

    #[error(transparent)]
    Coupon(CouponRejection),

    #[error("coupon cannot be combined with promoted products")]
    CouponConflictsWithPromotion,

    #[error("catalog unavailable")]
    Catalog(#[source] RepositoryError),

    #[error("coupon storage unavailable")]
    CouponStorage(#[source] RepositoryError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

impl From<CouponError> for PricingError {
    fn from(error: CouponError) -> Self {
        match error {
            CouponError::Rejected(rejection) => Self::Coupon(rejection),
            CouponError::Repository(error) => Self::CouponStorage(error),
            CouponError::Amount(error) => Self::Amount(error),
        }
    }
}

impl PricingError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyCart => "EMPTY_CART",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::ProductCurrency(_) => "PRODUCT_CURRENCY",
            Self::Coupon(rejection) => rejection.code(),
            Self::CouponConflictsWithPromotion => "COUPON_CONFLICTS_WITH_PROMOTION",
            Self::Catalog(_) | Self::CouponStorage(_) => "STORAGE",
            Self::Amount(_) => "AMOUNT",
        }
    }

    /// Whether the caller's input caused the error.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyCart
                | Self::InvalidQuantity(_)
                | Self::ProductNotFound(_)
                | Self::Coupon(_)
                | Self::CouponConflictsWithPromotion
        )
    }
}

/// Why a priced order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The coupon ran out or was withdrawn between pricing and placing the
    /// order.
    #[error(transparent)]
    Coupon(CouponRejection),

    #[error("order storage error")]
    Repository(#[source] RepositoryError),
}

impl CheckoutError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Pricing(error) => error.code(),
            Self::Coupon(rejection) => rejection.code(),
            Self::Repository(_) => "STORAGE",
        }
    }
}

impl From<RepositoryError> for CheckoutError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict => Self::Coupon(CouponRejection::Exhausted),
            RepositoryError::Unavailable => Self::Coupon(CouponRejection::NotFound),
            other => Self::Repository(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_rejections_keep_their_codes() {
        let error = PricingError::from(CouponError::Rejected(CouponRejection::BelowMinimum));

        assert_eq!(error.code(), "BELOW_MINIMUM");
        assert!(error.is_rejection(), "coupon rejection is caller input");
    }

    #[test]
    fn lost_redemption_race_reads_as_exhausted() {
        let error = CheckoutError::from(RepositoryError::Conflict);

        assert_eq!(error.code(), "EXHAUSTED");
    }

    #[test]
    fn withdrawn_coupon_reads_as_not_found() {
        let error = CheckoutError::from(RepositoryError::Unavailable);

        assert_eq!(error.code(), "NOT_FOUND");
    }
}
