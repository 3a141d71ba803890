use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use crate::auth::CredentialVerifier;
use crate::domain::{Cents, HistoryEntry, User, UserId, parse_cents, trade_total};
use crate::quotes::{Quote, QuoteProvider};
use crate::storage::{Repository, SessionStore, SqliteSessionStore, TradeOutcome};

use super::AppError;

/// Application service providing the trading-ledger operations. This is the
/// primary interface for any client (HTTP, CLI, tests); all collaborators
/// are injected and there is no ambient state.
#[derive(Clone)]
pub struct TradingService {
    repo: Repository,
    quotes: Arc<dyn QuoteProvider>,
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialVerifier>,
}

/// A freshly authenticated user plus the session token bound to them.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Result of a completed buy or sell. Amounts are unsigned magnitudes; the
/// operation determines direction.
#[derive(Debug)]
pub struct TradeReceipt {
    pub symbol: String,
    pub shares: i64,
    pub unit_price_cents: Cents,
    pub total_cents: Cents,
    pub cash_after: Cents,
}

/// One portfolio row. Pricing fields are None when the quote provider could
/// not answer for this symbol — explicitly unavailable, never zero.
pub struct PositionView {
    pub symbol: String,
    pub shares: i64,
    pub name: Option<String>,
    pub unit_price_cents: Option<Cents>,
    pub market_value_cents: Option<Cents>,
}

pub struct PortfolioView {
    pub cash_cents: Cents,
    pub positions: Vec<PositionView>,
    /// Cash plus all position values; omitted unless every row priced.
    pub total_cents: Option<Cents>,
}

/// One history row with the symbol's display name resolved for presentation.
pub struct HistoryRow {
    pub entry: HistoryEntry,
    pub name: Option<String>,
}

impl TradingService {
    /// Create a new trading service with the given collaborators.
    pub fn new(
        repo: Repository,
        quotes: Arc<dyn QuoteProvider>,
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            repo,
            quotes,
            sessions,
            credentials,
        }
    }

    /// Initialize a database at the given path and build a service over it,
    /// with sessions stored in the same database.
    pub async fn init(
        database_path: &str,
        quotes: Arc<dyn QuoteProvider>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, AppError> {
        let repo = Repository::init(database_path).await?;
        let sessions = Arc::new(SqliteSessionStore::new(repo.pool().clone()));
        Ok(Self::new(repo, quotes, sessions, credentials))
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account and log it in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<AuthSession, AppError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("must provide username".into()));
        }
        if password.is_empty() {
            return Err(AppError::Validation("must provide password".into()));
        }
        if confirmation.is_empty() {
            return Err(AppError::Validation("must provide confirmation".into()));
        }
        if password != confirmation {
            return Err(AppError::Validation("passwords do not match".into()));
        }

        if self.repo.get_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let hash = self
            .credentials
            .hash_password(password)
            .map_err(|e| AppError::Database(anyhow::Error::new(e)))?;

        let user = User::new(username.to_string(), hash);
        // The pre-check can race another registration; the insert decides.
        if !self.repo.create_user(&user).await? {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        let token = self.sessions.create(user.id).await?;
        Ok(AuthSession { user, token })
    }

    /// Log in with username and password. Any prior session token is cleared
    /// first, so login always lands in a fresh session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        prior_token: Option<&str>,
    ) -> Result<AuthSession, AppError> {
        // Logging in always starts from a clean slate, even if it fails.
        if let Some(token) = prior_token {
            self.sessions.clear(token).await?;
        }

        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("must provide username".into()));
        }
        if password.is_empty() {
            return Err(AppError::Validation("must provide password".into()));
        }

        let Some(user) = self.repo.get_user_by_username(username).await? else {
            return Err(AppError::InvalidCredentials);
        };
        if !self.credentials.verify(&user.password_hash, password) {
            return Err(AppError::InvalidCredentials);
        }

        let token = self.sessions.create(user.id).await?;
        Ok(AuthSession { user, token })
    }

    /// Clear the session; succeeds whether or not the token was live.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.sessions.clear(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let Some(user_id) = self.sessions.resolve(token).await? else {
            return Err(AppError::NotAuthenticated);
        };
        self.repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotAuthenticated)
    }

    // ========================
    // Market operations
    // ========================

    /// Look up the current quote for a symbol. No side effects.
    pub async fn quote(&self, symbol: &str) -> Result<Quote, AppError> {
        let symbol = normalize_symbol(symbol)?;
        self.fetch_quote(&symbol).await
    }

    /// Buy shares at the current market price.
    pub async fn buy(
        &self,
        user_id: UserId,
        symbol: &str,
        shares: i64,
    ) -> Result<TradeReceipt, AppError> {
        let symbol = normalize_symbol(symbol)?;
        if shares <= 0 {
            return Err(AppError::Validation(
                "share count must be a positive integer".into(),
            ));
        }

        let quote = self.fetch_quote(&symbol).await?;
        let total = trade_total(quote.price_cents, shares)
            .ok_or_else(|| AppError::Validation("share count too large".into()))?;

        match self
            .repo
            .execute_buy(user_id, &quote.symbol, shares, quote.price_cents, total)
            .await?
        {
            TradeOutcome::Applied { cash_after } => Ok(TradeReceipt {
                symbol: quote.symbol,
                shares,
                unit_price_cents: quote.price_cents,
                total_cents: total,
                cash_after,
            }),
            TradeOutcome::InsufficientFunds { balance } => Err(AppError::InsufficientFunds {
                balance,
                required: total,
            }),
            outcome => Err(AppError::Database(anyhow!(
                "unexpected buy outcome: {:?}",
                outcome
            ))),
        }
    }

    /// Sell shares at the current market price.
    pub async fn sell(
        &self,
        user_id: UserId,
        symbol: &str,
        shares: i64,
    ) -> Result<TradeReceipt, AppError> {
        let symbol = normalize_symbol(symbol)?;
        if shares <= 0 {
            return Err(AppError::Validation(
                "share count must be a positive integer".into(),
            ));
        }

        let quote = self.fetch_quote(&symbol).await?;
        let proceeds = trade_total(quote.price_cents, shares)
            .ok_or_else(|| AppError::Validation("share count too large".into()))?;

        match self
            .repo
            .execute_sell(user_id, &quote.symbol, shares, quote.price_cents, proceeds)
            .await?
        {
            TradeOutcome::Applied { cash_after } => Ok(TradeReceipt {
                symbol: quote.symbol,
                shares,
                unit_price_cents: quote.price_cents,
                total_cents: proceeds,
                cash_after,
            }),
            TradeOutcome::NoHolding => Err(AppError::NoHolding(symbol)),
            TradeOutcome::InsufficientShares { held } => Err(AppError::InsufficientShares {
                symbol,
                held,
                requested: shares,
            }),
            outcome => Err(AppError::Database(anyhow!(
                "unexpected sell outcome: {:?}",
                outcome
            ))),
        }
    }

    /// Deposit cash. The amount arrives as a decimal string and must be
    /// strictly positive. Returns the new balance.
    pub async fn deposit(&self, user_id: UserId, amount: &str) -> Result<Cents, AppError> {
        let amount = amount.trim();
        if amount.is_empty() {
            return Err(AppError::Validation("must provide amount".into()));
        }
        let cents =
            parse_cents(amount).map_err(|e| AppError::Validation(e.to_string()))?;
        if cents <= 0 {
            return Err(AppError::Validation("amount must be positive".into()));
        }

        Ok(self.repo.execute_deposit(user_id, cents).await?)
    }

    // ========================
    // Views
    // ========================

    /// Current portfolio: every position priced at the current quote, plus
    /// cash. Holdings are unique per symbol, so this is one provider call
    /// per distinct symbol held. A failed lookup leaves that row explicitly
    /// unpriced and drops the grand total.
    pub async fn portfolio(&self, user_id: UserId) -> Result<PortfolioView, AppError> {
        let user = self
            .repo
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotAuthenticated)?;
        let holdings = self.repo.list_holdings(user_id).await?;

        let mut positions = Vec::with_capacity(holdings.len());
        let mut total = Some(user.cash_cents);

        for holding in holdings {
            let quote = match self.quotes.lookup(&holding.symbol).await {
                Ok(quote) => quote,
                Err(e) => {
                    log::warn!("portfolio quote for {} failed: {:#}", holding.symbol, e);
                    None
                }
            };

            match quote {
                Some(quote) => {
                    let value = holding.market_value(quote.price_cents);
                    total = match (total, value) {
                        (Some(t), Some(v)) => t.checked_add(v),
                        _ => None,
                    };
                    positions.push(PositionView {
                        symbol: holding.symbol,
                        shares: holding.shares,
                        name: Some(quote.name),
                        unit_price_cents: Some(quote.price_cents),
                        market_value_cents: value,
                    });
                }
                None => {
                    total = None;
                    positions.push(PositionView {
                        symbol: holding.symbol,
                        shares: holding.shares,
                        name: None,
                        unit_price_cents: None,
                        market_value_cents: None,
                    });
                }
            }
        }

        Ok(PortfolioView {
            cash_cents: user.cash_cents,
            positions,
            total_cents: total,
        })
    }

    /// Full trade history, oldest first, with display names resolved once
    /// per distinct symbol.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<HistoryRow>, AppError> {
        let entries = self.repo.list_history(user_id).await?;

        let mut names: HashMap<String, Option<String>> = HashMap::new();
        let mut rows = Vec::with_capacity(entries.len());

        for entry in entries {
            let name = if entry.symbol.is_empty() {
                // Deposits carry no symbol.
                None
            } else {
                if !names.contains_key(&entry.symbol) {
                    let resolved = match self.quotes.lookup(&entry.symbol).await {
                        Ok(Some(quote)) => Some(quote.name),
                        Ok(None) => None,
                        Err(e) => {
                            log::warn!("history quote for {} failed: {:#}", entry.symbol, e);
                            None
                        }
                    };
                    names.insert(entry.symbol.clone(), resolved);
                }
                names.get(&entry.symbol).cloned().flatten()
            };
            rows.push(HistoryRow { entry, name });
        }

        Ok(rows)
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, AppError> {
        match self.quotes.lookup(symbol).await {
            Ok(Some(quote)) => Ok(quote),
            Ok(None) => Err(AppError::UnknownSymbol(symbol.to_string())),
            Err(e) => {
                log::warn!("quote lookup for {} failed: {:#}", symbol, e);
                Err(AppError::QuoteUnavailable)
            }
        }
    }
}

fn normalize_symbol(symbol: &str) -> Result<String, AppError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::Validation("must provide symbol".into()));
    }
    Ok(symbol)
}
