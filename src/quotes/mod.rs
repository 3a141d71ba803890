use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{Cents, cents_from_price};

/// A price lookup result: display name, normalized symbol, price in cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price_cents: Cents,
}

/// External symbol -> price lookup. `Ok(None)` means the symbol does not
/// exist; `Err` means the provider could not answer (timeout, transport,
/// malformed payload) and the caller must not treat the price as zero.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>>;
}

#[derive(Deserialize)]
struct WireQuote {
    #[serde(rename = "companyName")]
    company_name: String,
    symbol: String,
    #[serde(rename = "latestPrice")]
    latest_price: f64,
}

/// Quote provider over an IEX-style HTTP API:
/// `GET {base}/stock/{symbol}/quote?token={key}`. Every request carries a
/// bounded timeout so a stalled provider fails the lookup instead of
/// hanging the caller.
pub struct HttpQuoteProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpQuoteProvider {
    pub fn new(base_url: String, api_token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build quote client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>> {
        let url = format!("{}/stock/{}/quote", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("token", self.api_token.as_str())])
            .send()
            .await
            .with_context(|| format!("Quote request failed for {}", symbol))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "quote provider returned HTTP {} for {}",
                response.status(),
                symbol
            ));
        }

        let wire: WireQuote = response
            .json()
            .await
            .with_context(|| format!("Malformed quote payload for {}", symbol))?;

        let price_cents = cents_from_price(wire.latest_price)
            .ok_or_else(|| anyhow!("quote provider returned invalid price for {}", symbol))?;

        Ok(Some(Quote {
            symbol: wire.symbol,
            name: wire.company_name,
            price_cents,
        }))
    }
}
