//! Exponential backoff with an overall wait budget.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::RetryConfig;

/// Retry schedule of a listening loader.
///
/// Attempt `n` (1-based) waits `initial * multiplier^(n-1)`, plus up to
/// `jitter_ratio` of that delay. Retrying stops once the next delay would
/// push the accumulated wait past `max_total_wait`. A multiplier below 1.0
/// is treated as 1.0; configuration loading rejects such values up front.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_total_wait: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_total_wait: Duration::from_secs(60),
            jitter_ratio: 0.0,
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max_total_wait: Duration::from_millis(config.max_total_wait_ms),
            jitter_ratio: config.jitter_ratio,
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_total_wait(mut self, max_total_wait: Duration) -> Self {
        self.max_total_wait = max_total_wait;
        self
    }

    /// Delay before retry number `attempt`, or `None` once the budget is
    /// spent given `waited` so far.
    pub fn next_delay(&self, attempt: u32, waited: Duration) -> Option<Duration> {
        let delay = calculate_backoff(attempt, self.initial_delay, self.multiplier, self.jitter_ratio);
        if waited.saturating_add(delay) > self.max_total_wait {
            return None;
        }
        Some(delay)
    }

    /// Every delay the policy allows, in order, ignoring jitter.
    pub fn schedule(&self) -> Vec<Duration> {
        let plain = Self {
            jitter_ratio: 0.0,
            ..self.clone()
        };
        let mut delays = Vec::new();
        let mut waited = Duration::ZERO;
        let mut attempt = 1;
        while let Some(delay) = plain.next_delay(attempt, waited) {
            if delay.is_zero() {
                break;
            }
            waited += delay;
            delays.push(delay);
            attempt += 1;
        }
        delays
    }
}

/// Calculate exponential backoff delay with optional jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, multiplier: f64, jitter_ratio: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let factor = multiplier.max(1.0).powi(exponent);
    let secs = (base.as_secs_f64() * factor).min(u64::MAX as f64 / 2.0);
    let delay = Duration::from_secs_f64(secs);

    let jitter_range = delay.as_secs_f64() * jitter_ratio.clamp(0.0, 1.0);
    if jitter_range > 0.0 {
        let jitter = rand::thread_rng().gen_range(0.0..jitter_range);
        delay + Duration::from_secs_f64(jitter)
    } else {
        delay
    }
}
