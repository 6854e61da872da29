//! Cancellation of repository and statistics calls.
//!
//! Every operation in [`crate::core`] is a future; racing it against a
//! [`CancellationToken`] and dropping it when the token fires stops any further
//! I/O. An open transaction is rolled back when it is dropped uncommitted.

use crate::errors::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs `operation` unless `token` fires first, in which case the operation is
/// dropped and `Error::Cancelled` is returned.
///
/// An already-cancelled token short-circuits before the operation is polled.
pub async fn with_cancellation<F>(token: &CancellationToken, operation: F) -> Result<F::Output>
where
    F: Future,
{
    if token.is_cancelled() {
        debug!("operation cancelled before it started");
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!("operation cancelled while in flight");
            Err(Error::Cancelled)
        }
        output = operation => Ok(output),
    }
}
