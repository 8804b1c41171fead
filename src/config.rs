use crate::ownership::RetryPolicy;
use std::time::Duration;

/// Shard store configuration
///
/// Similar to a database session's lock-wait settings plus the retry policy
/// callers use for transient failures.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a lock acquisition may wait before failing as transient.
    /// `None` waits indefinitely.
    pub lock_wait_timeout: Option<Duration>,

    /// Backoff used by `ShardManager` for transient failures
    pub retry_policy: RetryPolicy,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            lock_wait_timeout: Some(Duration::from_secs(50)),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the lock wait timeout
    pub fn lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = Some(timeout);
        self
    }

    /// Wait for locks without a bound
    pub fn unbounded_lock_wait(mut self) -> Self {
        self.lock_wait_timeout = None;
        self
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
