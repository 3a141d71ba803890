use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
    Deposit,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
            TradeKind::Deposit => "deposit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TradeKind::Buy),
            "sell" => Some(TradeKind::Sell),
            "deposit" => Some(TradeKind::Deposit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of one ledger event. Sign convention: a buy is
/// recorded all-positive, a sell all-negative, a deposit with zero shares
/// and a positive total. Entries are append-only and ordered by row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Assigned by the database on insert; 0 until persisted.
    pub id: i64,
    pub user_id: UserId,
    pub kind: TradeKind,
    pub symbol: String,
    pub share_delta: i64,
    pub unit_price_cents: Cents,
    pub total_cents: Cents,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn buy(user_id: UserId, symbol: String, shares: i64, unit_price: Cents, total: Cents) -> Self {
        assert!(shares > 0, "buy entries require a positive share count");
        Self {
            id: 0,
            user_id,
            kind: TradeKind::Buy,
            symbol,
            share_delta: shares,
            unit_price_cents: unit_price,
            total_cents: total,
            recorded_at: Utc::now(),
        }
    }

    pub fn sell(user_id: UserId, symbol: String, shares: i64, unit_price: Cents, total: Cents) -> Self {
        assert!(shares > 0, "sell entries require a positive share count");
        Self {
            id: 0,
            user_id,
            kind: TradeKind::Sell,
            symbol,
            share_delta: -shares,
            unit_price_cents: -unit_price,
            total_cents: -total,
            recorded_at: Utc::now(),
        }
    }

    pub fn deposit(user_id: UserId, amount: Cents) -> Self {
        assert!(amount > 0, "deposit entries require a positive amount");
        Self {
            id: 0,
            user_id,
            kind: TradeKind::Deposit,
            symbol: String::new(),
            share_delta: 0,
            unit_price_cents: 0,
            total_cents: amount,
            recorded_at: Utc::now(),
        }
    }
}
