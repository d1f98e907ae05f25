// ================================================================
// File: modshop-common/src/error.rs
// ================================================================

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Bad user/admin input (reference format, email, numeric field).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate reference number: {0}")]
    DuplicateReference(String),

    #[error("Mod already exists: {0}")]
    DuplicateMod(String),

    #[error("Mod {0} not found")]
    ModNotFound(i32),

    #[error("No mod matches a payment of {amount}")]
    NoPriceMatch { amount: Decimal },

    #[error("Receipt could not be read (amount: '{amount}', reference: '{reference}')")]
    UnreadableReceipt { amount: String, reference: String },
}

impl Error {
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Any ledger I/O failure that is not one of the domain outcomes.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Migration(_))
    }
}
