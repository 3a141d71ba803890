use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

/// A user's current position in one ticker symbol. One row per
/// (user, symbol) pair; the share count is always positive while the row
/// exists — a position sold down to zero is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: UserId,
    pub symbol: String,
    pub shares: i64,
}

impl Holding {
    /// Market value of the position at the given unit price, or None on
    /// overflow.
    pub fn market_value(&self, unit_price: Cents) -> Option<Cents> {
        unit_price.checked_mul(self.shares)
    }
}
