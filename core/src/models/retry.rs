//! Retry policy as declarative data rather than decorators (§9 design
//! notes). Every suspending external call (metrics queries, adapter calls,
//! cluster API) is wrapped with one of these.

use std::time::Duration;

/// Which externally observed conditions are worth retrying. Authentication
/// and validation errors are never retriable (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetriableClass {
    ConnectionRefused,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed backoff between attempts (the spec calls for 1-3s fixed, not
    /// exponential).
    pub backoff: Duration,
    pub retriable: Vec<RetriableClass>,
}

impl RetryPolicy {
    /// The default policy named throughout §5: five attempts, fixed
    /// backoff, connection/timeout class errors only.
    pub fn default_external() -> Self {
        RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
            retriable: vec![RetriableClass::ConnectionRefused, RetriableClass::Timeout],
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_external()
    }
}
