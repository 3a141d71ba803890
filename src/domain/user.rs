use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type UserId = Uuid;

/// Cash balance granted to every new account: $10,000.00.
pub const STARTING_CASH_CENTS: Cents = 1_000_000;

/// A registered account. The password never leaves the credential verifier;
/// only its salted hash is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub cash_cents: Cents,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            cash_cents: STARTING_CASH_CENTS,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_gets_starting_cash() {
        let user = User::new("alice".into(), "hash".into());
        assert_eq!(user.cash_cents, STARTING_CASH_CENTS);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_users_get_distinct_ids() {
        let a = User::new("alice".into(), "h".into());
        let b = User::new("bob".into(), "h".into());
        assert_ne!(a.id, b.id);
    }
}
