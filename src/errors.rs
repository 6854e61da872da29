//! Unified error types and result handling.
//!
//! Read paths propagate these errors with `?`. Write paths never surface a
//! storage error directly; they classify it into a
//! [`WriteOutcome`](crate::core::outcome::WriteOutcome) instead.

use thiserror::Error;

/// Errors produced by the receipt ledger.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong while loading configuration
        message: String,
    },

    /// The storage layer failed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The caller's cancellation token fired before the operation finished.
    #[error("Operation cancelled")]
    Cancelled,

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable was missing or malformed.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Returns true when the error was caused by cancellation rather than failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
