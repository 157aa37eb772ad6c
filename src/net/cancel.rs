//! Per-connection cancellation scope.
//!
//! # Responsibilities
//! - One-shot, irreversible cancellation signal owned by a transport socket
//! - Gate every new operation: nothing touches the stream once cancelled
//! - Convert late results of in-flight operations into `Cancelled`
//!
//! # Design Decisions
//! - Cooperative only: there are no implicit timeouts
//! - Cancellation wins races (`biased` select), so no success is reported
//!   after the scope has been triggered

use std::future::Future;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::net::outcome::Outcome;

/// Cancellation signal shared by all pending operations on one connection.
#[derive(Debug, Clone, Default)]
pub struct CancellationScope {
    token: CancellationToken,
}

impl CancellationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the scope. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope has been triggered.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Run `future` under this scope.
    ///
    /// If the scope is already cancelled the future is never polled. Otherwise
    /// it races the cancellation signal; a result (success or fault) observed
    /// after cancellation is reported as [`Outcome::Cancelled`].
    pub async fn guard<F, T, E>(&self, future: F) -> Result<Outcome<T>, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        if self.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Ok(Outcome::Cancelled),
            result = future => {
                if self.is_cancelled() {
                    Ok(Outcome::Cancelled)
                } else {
                    result.map(Outcome::Completed)
                }
            }
        }
    }
}
