use thiserror::Error;

use crate::domain::{Cents, format_cents};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("username is taken: {0}")]
    UsernameTaken(String),

    #[error("invalid username and/or password")]
    InvalidCredentials,

    #[error("not logged in")]
    NotAuthenticated,

    #[error("stock symbol doesn't exist: {0}")]
    UnknownSymbol(String),

    #[error("quote service is unavailable, try again later")]
    QuoteUnavailable,

    #[error("not enough cash: balance {}, required {}", format_cents(*.balance), format_cents(*.required))]
    InsufficientFunds { balance: Cents, required: Cents },

    #[error("no shares of {0} held")]
    NoHolding(String),

    #[error("not enough shares of {symbol}: held {held}, requested {requested}")]
    InsufficientShares {
        symbol: String,
        held: i64,
        requested: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable discriminator for the {kind, message} wire
    /// contract.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::UsernameTaken(_) => "conflict",
            AppError::InvalidCredentials | AppError::NotAuthenticated => "authentication",
            AppError::UnknownSymbol(_) => "unknown_symbol",
            AppError::QuoteUnavailable => "quote_unavailable",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::NoHolding(_) => "no_holding",
            AppError::InsufficientShares { .. } => "insufficient_shares",
            AppError::Database(_) => "internal",
        }
    }

    /// True for errors caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AppError::Database(_))
    }
}
