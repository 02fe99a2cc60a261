//! Payments

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::{checkout::orders::OrderUuid, money::Price};

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Redirect to the payment provider.
    #[default]
    Online,

    /// Manual bank transfer against the order number.
    BankTransfer,

    /// Paid on collection at the venue.
    OnPickup,
}

impl PaymentMethod {
    /// Whether a provider transaction is created for this method.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// A transaction to open with the payment provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order: OrderUuid,
    pub total: Price,
    pub payer_email: String,
    pub description: String,
}

/// An opened transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    pub transaction_id: String,

    /// Where to send the customer to pay.
    pub redirect_url: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("payment provider timed out")]
    Timeout,
}

#[automock]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a transaction for an order.
    async fn create_transaction(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentTransaction, PaymentError>;
}
