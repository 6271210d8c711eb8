//! Retry policy implementation

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for retried remote operations
///
/// Retries wait a fixed interval between attempts. The overall `timeout`
/// is checked before every retry and can end the sequence before
/// `max_attempts` is reached.
///
/// # Example
///
/// ```
/// use fleetsweep_reaper::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed(Duration::from_secs(10), 3)
///     .with_timeout(Duration::from_secs(30 * 60));
///
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
/// assert!(policy.is_budget_consistent());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial)
    pub max_attempts: u32,

    /// Delay between a failed attempt and the next one
    #[serde(with = "duration_millis")]
    pub backoff: Duration,

    /// Ceiling on time elapsed since the first attempt
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::deprovision()
    }
}

impl RetryPolicy {
    /// Policy applied to worker deprovisioning
    ///
    /// - 3 max attempts
    /// - 10 second backoff
    /// - 30 minute ceiling
    pub fn deprovision() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    /// Create a policy with a fixed backoff
    ///
    /// The ceiling defaults to exactly the time the retries need to sleep.
    pub fn fixed(backoff: Duration, max_attempts: u32) -> Self {
        let max_attempts = max_attempts.max(1);
        Self {
            max_attempts,
            backoff,
            timeout: backoff.saturating_mul(max_attempts - 1),
        }
    }

    /// Set the maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff interval
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the overall timeout ceiling
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempt budget, never below one
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait before a given attempt number (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }

    /// Check if there are remaining attempts
    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.attempt_budget()
    }

    /// Whether the ceiling leaves room for every retry's backoff
    ///
    /// Not enforced: a tighter ceiling just curtails retries early.
    pub fn is_budget_consistent(&self) -> bool {
        let needed = self.backoff.saturating_mul(self.attempt_budget() - 1);
        self.timeout >= needed
    }
}

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
