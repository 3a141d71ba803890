use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{Cents, HistoryEntry, Holding, TradeKind, User, UserId};

use super::MIGRATION_001_INITIAL;

/// How long a writer waits for a competing transaction before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a transactional ledger mutation. The guard conditions are
/// evaluated inside the same statement that performs the write, so a
/// rejection here means nothing was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    Applied { cash_after: Cents },
    InsufficientFunds { balance: Cents },
    NoHolding,
    InsufficientShares { held: i64 },
}

/// Repository for persisting and querying users, holdings and trade history.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database file. WAL mode and a busy timeout keep
    /// concurrent per-user mutations serialized instead of failing fast.
    pub async fn connect(database_path: &str, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_path: &str) -> Result<Self> {
        let repo = Self::connect(database_path, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================
    // User operations
    // ========================

    /// Insert a new user. Returns false if the username is already taken —
    /// the UNIQUE constraint is the last word even if a pre-check raced.
    pub async fn create_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, cash_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.cash_cents)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e).context("Failed to create user"),
        }
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, cash_cents, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a user by exact username match.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, cash_cents, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    // ========================
    // Holdings
    // ========================

    /// Get a user's position in one symbol.
    pub async fn get_holding(&self, user_id: UserId, symbol: &str) -> Result<Option<Holding>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, symbol, shares
            FROM holdings
            WHERE user_id = ? AND symbol = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch holding")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_holding(&row)?)),
            None => Ok(None),
        }
    }

    /// List all of a user's positions, ordered by symbol.
    pub async fn list_holdings(&self, user_id: UserId) -> Result<Vec<Holding>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, symbol, shares
            FROM holdings
            WHERE user_id = ?
            ORDER BY symbol
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list holdings")?;

        rows.iter().map(Self::row_to_holding).collect()
    }

    // ========================
    // History
    // ========================

    /// List a user's trade history, oldest first.
    pub async fn list_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, symbol, share_delta, unit_price_cents, total_cents, recorded_at
            FROM history
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list history")?;

        rows.iter().map(Self::row_to_history).collect()
    }

    // ========================
    // Ledger mutations
    // ========================

    /// Buy `shares` of `symbol` at `unit_price`. The cash debit, the history
    /// append and the holding upsert commit together or not at all; the funds
    /// check happens in the debit statement itself, so a concurrent writer
    /// can never push the balance negative.
    pub async fn execute_buy(
        &self,
        user_id: UserId,
        symbol: &str,
        shares: i64,
        unit_price: Cents,
        total: Cents,
    ) -> Result<TradeOutcome> {
        let user_id_str = user_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin buy")?;

        let debited = sqlx::query(
            r#"
            UPDATE users SET cash_cents = cash_cents - ?1
            WHERE id = ?2 AND cash_cents >= ?1
            "#,
        )
        .bind(total)
        .bind(&user_id_str)
        .execute(&mut *tx)
        .await
        .context("Failed to debit cash")?;

        if debited.rows_affected() == 0 {
            let balance = Self::cash_in_tx(&mut tx, &user_id_str).await?;
            tx.rollback().await.context("Failed to roll back buy")?;
            return Ok(TradeOutcome::InsufficientFunds { balance });
        }

        let entry = HistoryEntry::buy(user_id, symbol.to_string(), shares, unit_price, total);
        Self::append_history(&mut tx, &entry).await?;

        sqlx::query(
            r#"
            INSERT INTO holdings (user_id, symbol, shares)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id, symbol) DO UPDATE SET shares = shares + excluded.shares
            "#,
        )
        .bind(&user_id_str)
        .bind(symbol)
        .bind(shares)
        .execute(&mut *tx)
        .await
        .context("Failed to upsert holding")?;

        let cash_after = Self::cash_in_tx(&mut tx, &user_id_str).await?;
        tx.commit().await.context("Failed to commit buy")?;
        Ok(TradeOutcome::Applied { cash_after })
    }

    /// Sell `shares` of `symbol` at `unit_price`. The share decrement carries
    /// the ownership guard; a position that reaches zero is removed in the
    /// same transaction.
    pub async fn execute_sell(
        &self,
        user_id: UserId,
        symbol: &str,
        shares: i64,
        unit_price: Cents,
        proceeds: Cents,
    ) -> Result<TradeOutcome> {
        let user_id_str = user_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin sell")?;

        let decremented = sqlx::query(
            r#"
            UPDATE holdings SET shares = shares - ?1
            WHERE user_id = ?2 AND symbol = ?3 AND shares >= ?1
            "#,
        )
        .bind(shares)
        .bind(&user_id_str)
        .bind(symbol)
        .execute(&mut *tx)
        .await
        .context("Failed to decrement holding")?;

        if decremented.rows_affected() == 0 {
            let held: Option<i64> =
                sqlx::query("SELECT shares FROM holdings WHERE user_id = ? AND symbol = ?")
                    .bind(&user_id_str)
                    .bind(symbol)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to fetch holding")?
                    .map(|row| row.get("shares"));
            tx.rollback().await.context("Failed to roll back sell")?;
            return Ok(match held {
                None => TradeOutcome::NoHolding,
                Some(held) => TradeOutcome::InsufficientShares { held },
            });
        }

        sqlx::query("DELETE FROM holdings WHERE user_id = ? AND symbol = ? AND shares = 0")
            .bind(&user_id_str)
            .bind(symbol)
            .execute(&mut *tx)
            .await
            .context("Failed to prune empty holding")?;

        let entry = HistoryEntry::sell(user_id, symbol.to_string(), shares, unit_price, proceeds);
        Self::append_history(&mut tx, &entry).await?;

        sqlx::query("UPDATE users SET cash_cents = cash_cents + ? WHERE id = ?")
            .bind(proceeds)
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to credit cash")?;

        let cash_after = Self::cash_in_tx(&mut tx, &user_id_str).await?;
        tx.commit().await.context("Failed to commit sell")?;
        Ok(TradeOutcome::Applied { cash_after })
    }

    /// Credit `amount` to the user's cash balance and record it.
    pub async fn execute_deposit(&self, user_id: UserId, amount: Cents) -> Result<Cents> {
        let user_id_str = user_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin deposit")?;

        sqlx::query("UPDATE users SET cash_cents = cash_cents + ? WHERE id = ?")
            .bind(amount)
            .bind(&user_id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to credit deposit")?;

        let entry = HistoryEntry::deposit(user_id, amount);
        Self::append_history(&mut tx, &entry).await?;

        let cash_after = Self::cash_in_tx(&mut tx, &user_id_str).await?;
        tx.commit().await.context("Failed to commit deposit")?;
        Ok(cash_after)
    }

    async fn append_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        entry: &HistoryEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO history (user_id, kind, symbol, share_delta, unit_price_cents, total_cents, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id.to_string())
        .bind(entry.kind.as_str())
        .bind(&entry.symbol)
        .bind(entry.share_delta)
        .bind(entry.unit_price_cents)
        .bind(entry.total_cents)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .context("Failed to append history entry")?;
        Ok(())
    }

    async fn cash_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        user_id: &str,
    ) -> Result<Cents> {
        let row = sqlx::query("SELECT cash_cents FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to fetch cash balance")?;
        match row {
            Some(row) => Ok(row.get("cash_cents")),
            None => bail!("user {} does not exist", user_id),
        }
    }

    // ========================
    // Row mappers
    // ========================

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            cash_cents: row.get("cash_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_holding(row: &sqlx::sqlite::SqliteRow) -> Result<Holding> {
        let user_id_str: String = row.get("user_id");

        Ok(Holding {
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            symbol: row.get("symbol"),
            shares: row.get("shares"),
        })
    }

    fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryEntry> {
        let user_id_str: String = row.get("user_id");
        let kind_str: String = row.get("kind");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(HistoryEntry {
            id: row.get("id"),
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            kind: TradeKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid trade kind: {}", kind_str))?,
            symbol: row.get("symbol"),
            share_delta: row.get("share_delta"),
            unit_price_cents: row.get("unit_price_cents"),
            total_cents: row.get("total_cents"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
