//! Schema lifecycle reconciliation.
//!
//! Per kind: fetch; create if absent (a lost race is fine); otherwise check
//! the schema version and, if stale, re-fetch/re-check/update under a bounded
//! poll; then poll until the store reports the descriptor established,
//! deleting it again if that never happens.

mod poll;
mod reconciler;

pub use poll::{
    poll, CancelHandle, Cancellation, PollConfig, Step, DEFAULT_POLL_INTERVAL,
    DEFAULT_POLL_TIMEOUT,
};
pub use reconciler::{Outcome, Reconciler};
