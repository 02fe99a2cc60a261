//! Exchange rates
//!
//! Rates are expressed as units of the base currency per one unit of the
//! quote currency, e.g. `4.25` PLN per EUR.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Errors raised while fetching a rate.
#[derive(Debug, Error)]
pub enum ExchangeRateError {
    #[error("exchange rate request failed")]
    Http(#[from] reqwest::Error),

    #[error("no rate published for {0}")]
    MissingRate(&'static str),

    #[error("invalid exchange rate {0}")]
    InvalidRate(Decimal),

    #[error("rates against {base} are not supported")]
    UnsupportedBase { base: &'static str },
}

#[automock]
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Units of `base` per one unit of `quote`.
    async fn get_rate(
        &self,
        base: &'static Currency,
        quote: &'static Currency,
    ) -> Result<Decimal, ExchangeRateError>;
}

#[derive(Debug, Deserialize)]
struct NbpRates {
    rates: Vec<NbpRate>,
}

#[derive(Debug, Deserialize)]
struct NbpRate {
    mid: Decimal,
}

/// Mid rates from the National Bank of Poland table A.
#[derive(Debug, Clone)]
pub struct NbpExchangeRateProvider {
    client: reqwest::Client,
    url: String,
}

impl NbpExchangeRateProvider {
    /// Create a provider querying `url` (the table A rates endpoint) with a
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ExchangeRateError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn rate_url(&self, quote: &Currency) -> String {
        format!(
            "{}/{}/?format=json",
            self.url.trim_end_matches('/'),
            quote.iso_alpha_code.to_ascii_lowercase()
        )
    }
}

#[async_trait]
impl ExchangeRateProvider for NbpExchangeRateProvider {
    async fn get_rate(
        &self,
        base: &'static Currency,
        quote: &'static Currency,
    ) -> Result<Decimal, ExchangeRateError> {
        if base.iso_alpha_code != "PLN" {
            return Err(ExchangeRateError::UnsupportedBase {
                base: base.iso_alpha_code,
            });
        }

        let response: NbpRates = self
            .client
            .get(self.rate_url(quote))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let rate = response
            .rates
            .first()
            .map(|rate| rate.mid)
            .ok_or(ExchangeRateError::MissingRate(quote.iso_alpha_code))?;

        if rate <= Decimal::ZERO {
            return Err(ExchangeRateError::InvalidRate(rate));
        }

        Ok(rate)
    }
}

/// Where a quoted rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    Live,
    Fallback,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// A rate ready to convert with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuote {
    pub rate: Decimal,
    pub source: RateSource,
}

/// Wraps a provider and answers with a fixed rate whenever it fails.
#[derive(Clone)]
pub struct FallbackExchangeRates {
    provider: Option<Arc<dyn ExchangeRateProvider>>,
    fallback: Decimal,
}

impl fmt::Debug for FallbackExchangeRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackExchangeRates")
            .field("live", &self.provider.is_some())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl FallbackExchangeRates {
    /// Use `provider`, falling back to `fallback` on failure.
    #[must_use]
    pub fn new(provider: Arc<dyn ExchangeRateProvider>, fallback: Decimal) -> Self {
        Self {
            provider: Some(provider),
            fallback,
        }
    }

    /// Always answer with the fallback rate.
    #[must_use]
    pub const fn offline(fallback: Decimal) -> Self {
        Self {
            provider: None,
            fallback,
        }
    }

    /// Quote `base` per unit of `quote`. Never fails.
    pub async fn quote(&self, base: &'static Currency, quote: &'static Currency) -> RateQuote {
        let Some(provider) = &self.provider else {
            return self.fallback_quote();
        };

        match provider.get_rate(base, quote).await {
            Ok(rate) if rate > Decimal::ZERO => RateQuote {
                rate,
                source: RateSource::Live,
            },
            Ok(rate) => {
                warn!(
                    %rate,
                    fallback = %self.fallback,
                    "provider returned a non-positive rate, using fallback"
                );

                self.fallback_quote()
            }
            Err(err) => {
                warn!(
                    error = %err,
                    base = base.iso_alpha_code,
                    quote = quote.iso_alpha_code,
                    fallback = %self.fallback,
                    "exchange rate unavailable, using fallback"
                );

                self.fallback_quote()
            }
        }
    }

    const fn fallback_quote(&self) -> RateQuote {
        RateQuote {
            rate: self.fallback,
            source: RateSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::iso::{EUR, PLN, USD};
    use testresult::TestResult;

    use super::*;

    #[tokio::test]
    async fn live_rate_is_used_when_available() {
        let mut provider = MockExchangeRateProvider::new();

        provider
            .expect_get_rate()
            .once()
            .withf(|base, quote| base.iso_alpha_code == "PLN" && quote.iso_alpha_code == "EUR")
            .return_once(|_, _| Ok(dec!(4.3012)));

        let rates = FallbackExchangeRates::new(Arc::new(provider), dec!(4.25));

        assert_eq!(
            rates.quote(PLN, EUR).await,
            RateQuote {
                rate: dec!(4.3012),
                source: RateSource::Live
            }
        );
    }

    #[tokio::test]
    async fn failure_falls_back_to_fixed_rate() {
        let mut provider = MockExchangeRateProvider::new();

        provider
            .expect_get_rate()
            .once()
            .return_once(|_, _| Err(ExchangeRateError::MissingRate("EUR")));

        let rates = FallbackExchangeRates::new(Arc::new(provider), dec!(4.25));

        assert_eq!(
            rates.quote(PLN, EUR).await,
            RateQuote {
                rate: dec!(4.25),
                source: RateSource::Fallback
            }
        );
    }

    #[tokio::test]
    async fn offline_rates_never_call_out() {
        let rates = FallbackExchangeRates::offline(dec!(4.25));

        assert_eq!(rates.quote(PLN, EUR).await.source, RateSource::Fallback);
    }

    #[tokio::test]
    async fn nbp_rejects_non_zloty_base() -> TestResult {
        let provider =
            NbpExchangeRateProvider::new("http://127.0.0.1:9", Duration::from_millis(100))?;

        let result = provider.get_rate(USD, EUR).await;

        assert!(
            matches!(result, Err(ExchangeRateError::UnsupportedBase { base: "USD" })),
            "expected UnsupportedBase, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn nbp_url_uses_lowercase_code() -> TestResult {
        let provider = NbpExchangeRateProvider::new(
            "https://api.nbp.pl/api/exchangerates/rates/a/",
            Duration::from_secs(1),
        )?;

        assert_eq!(
            provider.rate_url(EUR),
            "https://api.nbp.pl/api/exchangerates/rates/a/eur/?format=json"
        );

        Ok(())
    }

    #[test]
    fn nbp_payload_parses_mid_rate() -> TestResult {
        let payload: NbpRates = serde_json::from_str(
            r#"{"table":"A","currency":"euro","code":"EUR","rates":[{"no":"1/A/NBP/2026","effectiveDate":"2026-01-02","mid":4.2617}]}"#,
        )?;

        assert_eq!(payload.rates.first().map(|rate| rate.mid), Some(dec!(4.2617)));

        Ok(())
    }
}
