// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tempfile::TempDir;
use tradeledger::application::{AuthSession, TradingService};
use tradeledger::auth::Argon2Verifier;
use tradeledger::domain::Cents;
use tradeledger::quotes::{Quote, QuoteProvider};

/// In-memory quote provider with adjustable prices, so tests can move the
/// market between a buy and a sell or take a symbol offline.
pub struct FixedQuotes {
    prices: Mutex<HashMap<String, Quote>>,
    failing: Mutex<HashSet<String>>,
}

impl FixedQuotes {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Set (or update) the quoted price for a symbol.
    pub fn set(&self, symbol: &str, name: &str, price_cents: Cents) {
        self.prices.lock().unwrap().insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                name: name.to_string(),
                price_cents,
            },
        );
    }

    /// Forget a symbol entirely (provider reports it as unknown).
    pub fn remove(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }

    /// Make lookups for a symbol fail as if the provider were down.
    pub fn fail(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }
}

#[async_trait]
impl QuoteProvider for FixedQuotes {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>> {
        if self.failing.lock().unwrap().contains(symbol) {
            bail!("quote provider is down");
        }
        Ok(self.prices.lock().unwrap().get(symbol).cloned())
    }
}

/// Helper to create a test service with a temporary database and a fixed
/// quote provider.
pub async fn test_service() -> Result<(TradingService, Arc<FixedQuotes>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let quotes = Arc::new(FixedQuotes::new());
    let service = TradingService::init(
        db_path.to_str().unwrap(),
        quotes.clone(),
        Arc::new(Argon2Verifier),
    )
    .await?;
    Ok((service, quotes, temp_dir))
}

/// Register a user with a throwaway password and return the live session.
pub async fn register_user(service: &TradingService, username: &str) -> Result<AuthSession> {
    Ok(service.register(username, "hunter2", "hunter2").await?)
}
