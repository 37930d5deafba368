use std::time::Duration;

use crate::error::NovelizeError;

/// Decides whether a failed call is worth repeating.
pub type RetryPredicate = fn(&NovelizeError) -> bool;

#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub is_retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            is_retryable: rate_limited,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt`
    /// (0-indexed): `initial_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay * 2u32.saturating_pow(attempt)
    }

    pub fn should_retry(&self, err: &NovelizeError, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts && (self.is_retryable)(err)
    }
}

/// Default predicate. Upstream clients do not reliably type rate limits,
/// so fall back to message sniffing when the error is untyped.
pub fn rate_limited(err: &NovelizeError) -> bool {
    if matches!(err, NovelizeError::RateLimited { .. }) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("429") || message.contains("rate limit") || message.contains("too many requests")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(80));
    }

    #[test]
    fn no_retry_after_max_attempts() {
        let policy = RetryPolicy::default();
        let err = NovelizeError::RateLimited {
            message: "slow down".to_string(),
        };
        for attempt in 0..policy.max_attempts - 1 {
            assert!(policy.should_retry(&err, attempt));
        }
        assert!(!policy.should_retry(&err, policy.max_attempts - 1));
    }

    #[test]
    fn typed_rate_limit_is_retryable() {
        assert!(rate_limited(&NovelizeError::RateLimited {
            message: String::new(),
        }));
    }

    #[test]
    fn message_sniffing_catches_untyped_rate_limits() {
        assert!(rate_limited(&NovelizeError::ApiFailed {
            status: 429,
            message: "429 Too Many Requests".to_string(),
        }));
        assert!(rate_limited(&NovelizeError::SynthesisFailed {
            reason: "Rate limit exceeded, retry later".to_string(),
        }));
    }

    #[test]
    fn unrelated_errors_are_not_retryable() {
        assert!(!rate_limited(&NovelizeError::NoAudioTrack));
        assert!(!rate_limited(&NovelizeError::ApiFailed {
            status: 500,
            message: "internal server error".to_string(),
        }));
    }
}
