pub mod application;
pub mod auth;
pub mod domain;
pub mod http;
pub mod quotes;
pub mod storage;

pub use domain::*;
pub use storage::Repository;
