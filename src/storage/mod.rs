mod repository;
mod session;

pub use repository::*;
pub use session::*;

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");
