//! Core business logic - framework-agnostic repositories, validation and statistics.
//!
//! Every repository function takes the unit of work (`&DatabaseConnection` or
//! `&DatabaseTransaction`) as its first argument and the owning `user_id` as its
//! second. Nothing here holds state between calls.

/// Cancellation of in-flight operations
pub mod cancel;
/// Write outcome taxonomy and storage-error classification
pub mod outcome;
/// Skip/take pagination and the page wrapper
pub mod pagination;
/// Product repository
pub mod product;
/// Receipt repository, including item reconciliation
pub mod receipt;
/// Read-only sizing repository and unit conversion
pub mod sizing;
/// Spending statistics by day, ISO week or month
pub mod stats;
/// Store repository
pub mod store;
/// Accent and case folding for name search
pub mod text;
/// Structural and uniqueness validation of inputs
pub mod validation;
