use crate::config::RetryConfig;
use crate::storage::ErrorKind;
use std::time::Duration;

/// Retry/backoff schedule for extraction attempts
///
/// Delays grow as `base * 2^attempt`, capped at `max_delay`. Rate-limit
/// responses jump two doublings ahead so an explicitly throttling portal gets
/// breathing room sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Backoff delay after the given attempt (1-based) failed with `kind`
    pub fn backoff_delay(&self, kind: ErrorKind, attempt: u32) -> Duration {
        let exponent = if kind == ErrorKind::RateLimited {
            attempt.saturating_add(2)
        } else {
            attempt
        };

        // Saturate rather than overflow for absurd attempt counts; the cap
        // clamps the result long before 2^20 anyway
        let factor = 2u32.saturating_pow(exponent.min(20));
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);

        delay.min(self.max_delay)
    }
}

/// Lifecycle of one extraction work item
///
/// ```text
/// Pending -> InProgress -> Success
/// Pending -> InProgress -> Retrying -> InProgress -> ... -> FailedPermanent
/// ```
///
/// `Success` and `FailedPermanent` are terminal. Only transient error kinds
/// enter `Retrying`; a non-transient kind goes straight to `FailedPermanent`
/// even when attempts remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Not yet attempted
    Pending,
    /// A fetch attempt is underway
    InProgress { attempt: u32 },
    /// Waiting out a backoff delay before the next attempt
    Retrying { attempt: u32, delay: Duration },
    /// An extracted record was written
    Success,
    /// Attempts exhausted or the error was not retryable
    FailedPermanent { kind: ErrorKind, attempts: u32 },
}

impl ItemState {
    /// Moves into the next attempt
    ///
    /// From `Pending` this is attempt 1; from `Retrying` the attempt counter
    /// advances. Calling on a terminal or in-progress state is a logic error
    /// and leaves the state unchanged.
    pub fn begin_attempt(self) -> ItemState {
        match self {
            Self::Pending => Self::InProgress { attempt: 1 },
            Self::Retrying { attempt, .. } => Self::InProgress {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Records a successful extraction
    pub fn on_success(self) -> ItemState {
        match self {
            Self::InProgress { .. } => Self::Success,
            other => other,
        }
    }

    /// Records a failed attempt, deciding between retry and terminal failure
    pub fn on_error(self, kind: ErrorKind, policy: &RetryPolicy) -> ItemState {
        match self {
            Self::InProgress { attempt } => {
                if !kind.is_transient() || attempt >= policy.max_attempts {
                    Self::FailedPermanent {
                        kind,
                        attempts: attempt,
                    }
                } else {
                    Self::Retrying {
                        attempt,
                        delay: policy.backoff_delay(kind, attempt),
                    }
                }
            }
            other => other,
        }
    }

    /// Returns true once no further attempts will be made
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::FailedPermanent { .. })
    }

    /// The backoff delay to wait before the next attempt, if retrying
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Retrying { delay, .. } => Some(*delay),
            _ => None,
        }
    }
}
