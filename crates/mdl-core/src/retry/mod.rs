//! Retry and backoff policy.
//!
//! Two failure classes get different treatment: non-success HTTP statuses are
//! retried a bounded number of times after a visible countdown, while
//! connectivity loss is retried without bound (gated on reachability) with an
//! escalating request timeout.

mod classify;
mod policy;

pub use classify::{classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy, RetryState, TimeoutEscalation};
