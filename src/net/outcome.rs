//! Terminal outcome of a transport operation.
//!
//! Every asynchronous operation ends in exactly one of three ways: it
//! completes, it faults (`Err`), or its scope was cancelled. Cancellation is
//! not an error and never reaches an error callback.

use crate::net::error::TransportError;

/// Non-error terminal state of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    /// The operation ran to completion.
    Completed(T),
    /// The owning scope was cancelled before a result could be delivered.
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Returns the completed value, discarding cancellation.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Route a single terminal result to exactly one callback.
///
/// `on_success` receives a completed value, `on_error` a fault. A cancelled
/// outcome invokes neither. Returns `true` when a callback ran.
pub fn deliver<T>(
    result: Result<Outcome<T>, TransportError>,
    on_success: impl FnOnce(T),
    on_error: impl FnOnce(TransportError),
) -> bool {
    match result {
        Ok(Outcome::Completed(value)) => {
            on_success(value);
            true
        }
        Ok(Outcome::Cancelled) => false,
        Err(err) => {
            on_error(err);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn deliver_routes_success_only_to_success() {
        let (ok, failed) = (Cell::new(0), Cell::new(0));
        let ran = deliver(
            Ok(Outcome::Completed(7)),
            |value| {
                assert_eq!(value, 7);
                ok.set(ok.get() + 1);
            },
            |_| failed.set(failed.get() + 1),
        );
        assert!(ran);
        assert_eq!((ok.get(), failed.get()), (1, 0));
    }

    #[test]
    fn deliver_routes_fault_once() {
        let (ok, failed) = (Cell::new(0), Cell::new(0));
        deliver::<()>(
            Err(TransportError::NotConnected),
            |_| ok.set(ok.get() + 1),
            |_| failed.set(failed.get() + 1),
        );
        assert_eq!((ok.get(), failed.get()), (0, 1));
    }

    #[test]
    fn cancellation_reaches_no_callback() {
        let ran = deliver::<()>(
            Ok(Outcome::Cancelled),
            |_| panic!("success after cancellation"),
            |_| panic!("cancellation routed as error"),
        );
        assert!(!ran);
    }

    #[test]
    fn map_preserves_cancellation() {
        assert_eq!(Outcome::<u8>::Cancelled.map(|v| v + 1), Outcome::Cancelled);
        assert_eq!(Outcome::Completed(1u8).map(|v| v + 1), Outcome::Completed(2));
    }
}
