//! Cooperative cancellation for filter and rebuild requests.
//!
//! Every asynchronous request carries a [`CancellationToken`]. A
//! [`RequestSupervisor`] hands out one token per request and cancels the
//! previous one, so a newer request supersedes an older one and abandoned
//! work does not pile up. Workers check their token between batches, never
//! mid-record, and report [`Outcome::Cancelled`] instead of an error.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Result of a cancellable operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The completed value, or `None` when cancelled.
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

/// Token and sequence number of one supervised request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    pub id: u64,
    pub token: CancellationToken,
}

/// Tracks the caller-visible "latest request" of one kind.
#[derive(Debug, Default)]
pub struct RequestSupervisor {
    current: Mutex<Option<RequestTicket>>,
    next_id: AtomicU64,
}

impl RequestSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, cancelling the one it supersedes.
    pub fn begin(&self) -> RequestTicket {
        let ticket = RequestTicket {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
        };
        let previous = self.current.lock().replace(ticket.clone());
        if let Some(previous) = previous {
            trace!(superseded = previous.id, by = ticket.id, "Cancelling superseded request");
            previous.token.cancel();
        }
        ticket
    }

    /// Whether `ticket` is still the latest request.
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|current| current.id == ticket.id)
    }

    /// Cancel the latest request, if any.
    pub fn cancel_current(&self) {
        if let Some(current) = self.current.lock().take() {
            current.token.cancel();
        }
    }
}
