//! Write outcomes.
//!
//! Repository writes never return storage errors to their callers. The error is
//! logged here and reduced to a [`WriteOutcome`]; only the constraint family is
//! kept, so nothing about table or index names leaks upwards.

use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use tracing::{error, warn};

/// Lower-cased fragments that identify a constraint failure in driver messages.
const CONSTRAINT_MARKERS: [&str; 4] = [
    "foreign key",
    "unique constraint",
    "constraint failed",
    "integrity constraint",
];

/// Result of a create, update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteOutcome {
    /// At least one row was written.
    Success,
    /// The statement ran but touched no row.
    NoChange,
    /// The scoped lookup before the write found nothing.
    NotFound,
    /// A uniqueness or referential constraint rejected the write.
    Restricted,
    /// Any other failure.
    Error,
}

impl WriteOutcome {
    /// Maps an affected-row count to `Success` or `NoChange`.
    #[must_use]
    pub const fn from_rows_affected(rows: u64) -> Self {
        if rows > 0 { Self::Success } else { Self::NoChange }
    }

    /// Returns true for `Success`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Generic message suitable for end users.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Success => "Saved",
            Self::NoChange => "Nothing was changed",
            Self::NotFound => "The requested item was not found",
            Self::Restricted => "The item already exists or is in use",
            Self::Error => "Something went wrong, please try again later",
        }
    }
}

/// Classifies a storage error as `Restricted` or `Error`.
///
/// The driver's own constraint classification is used when available; the
/// message of every error in the `source()` chain is inspected otherwise.
#[must_use]
pub fn classify_db_error(err: &DbErr) -> WriteOutcome {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_) | SqlErr::ForeignKeyConstraintViolation(_)) => {
            WriteOutcome::Restricted
        }
        _ if mentions_constraint(err) => WriteOutcome::Restricted,
        _ => WriteOutcome::Error,
    }
}

fn mentions_constraint(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if CONSTRAINT_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Classifies and logs a failed write.
pub(crate) fn write_failed(operation: &str, err: &DbErr) -> WriteOutcome {
    let outcome = classify_db_error(err);
    match outcome {
        WriteOutcome::Restricted => warn!(operation, "write rejected by constraint: {err}"),
        _ => error!(operation, "write failed: {err}"),
    }
    outcome
}
