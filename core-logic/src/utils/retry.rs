use crate::transfer::TransferResult;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Substrings that mark a failure message as worth retrying.
const TRANSIENT_PATTERNS: [&str; 6] = [
    "nonce",
    "timeout",
    "rpc",
    "temporary",
    "context deadline exceeded",
    "rate limit",
];

/// Heuristic: true iff the lower-cased message contains a transient pattern.
///
/// Plain substring matching misclassifies in both directions (an RPC node
/// answering "execution reverted" behind an `rpc error:` prefix is retried,
/// a `503 Service Unavailable` is not). Callers that need precision should
/// supply their own [`FailureClassifier`].
pub fn is_transient(message: &str) -> bool {
    if message.is_empty() {
        return false;
    }
    let message = message.to_lowercase();
    TRANSIENT_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Decides whether a failed attempt should be retried.
pub trait FailureClassifier: Send + Sync {
    fn is_transient(&self, message: &str) -> bool;
}

/// The default substring classifier, see [`is_transient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl FailureClassifier for HeuristicClassifier {
    fn is_transient(&self, message: &str) -> bool {
        is_transient(message)
    }
}

impl<F> FailureClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_transient(&self, message: &str) -> bool {
        self(message)
    }
}

/// Exponential backoff schedule for transfer attempts.
///
/// Defaults to the plain doubling schedule with no cap and no jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Option<Duration>,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: None,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts == 0` is treated as a single attempt.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Default::default()
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to sleep after the failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let mut delay = self.initial_backoff.saturating_mul(factor);
        if let Some(cap) = self.max_backoff {
            delay = delay.min(cap);
        }
        if self.jitter {
            let rng_factor = rand::thread_rng().gen_range(0.5..=1.5);
            delay = delay.mul_f64(rng_factor);
        }
        delay
    }
}

/// Runs `attempt` until it succeeds, fails with a non-transient error, or
/// the policy's attempt budget is spent. Returns the last result unchanged,
/// with its `attempts` field set to the number of attempts made.
pub async fn execute_with_retry<F, Fut, C>(
    policy: &RetryPolicy,
    classifier: &C,
    mut attempt: F,
) -> TransferResult
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = TransferResult>,
    C: FailureClassifier + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut number = 1;

    loop {
        let mut result = attempt(number).await;
        result.attempts = number;

        if result.is_success() {
            if number > 1 {
                debug!("Transfer to {} succeeded on attempt {}", result.to, number);
            }
            return result;
        }

        let message = result.error.clone().unwrap_or_default();
        if !classifier.is_transient(&message) {
            return result;
        }
        if number >= max_attempts {
            if max_attempts > 1 {
                warn!(
                    "Transfer to {} still failing after {} attempts: {}",
                    result.to, number, message
                );
            }
            return result;
        }

        let delay = policy.backoff_for(number);
        debug!(
            "Transfer to {} failed (attempt {}/{}). Retrying in {:?}: {}",
            result.to, number, max_attempts, delay, message
        );
        tokio::time::sleep(delay).await;
        number += 1;
    }
}
