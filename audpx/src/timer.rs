//! Handshake timing: reply timeouts and retry back-off.
//!
//! Only the INIT handshake ever waits for a reply, so this is the only place
//! in the client where time is spent blocked on the network.  Two schedules
//! are derived from [`TimerConfig`]:
//! - the reply wait for attempt `n` (0-based) is `ack_timeout × 2^n`;
//! - after the `n`-th timed-out attempt (1-based) the client sleeps
//!   `base_backoff × 2^(n−1)`, jittered uniformly by ±20 %.

use std::time::Duration;

use rand::Rng;

/// Largest exponent applied to either schedule; keeps the arithmetic finite
/// even for silly retry budgets.
const MAX_EXPONENT: u32 = 16;

/// Jitter bounds applied to each back-off delay.
const JITTER_LOW: f64 = 0.8;
const JITTER_HIGH: f64 = 1.2;

/// Adjustable handshake timing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerConfig {
    /// Reply wait for the first INIT attempt.
    pub ack_timeout: Duration,
    /// Back-off base before jitter.
    pub base_backoff: Duration,
    /// Retries allowed after the first attempt.  `0` means a single attempt.
    pub max_retries: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(3),
            base_backoff: Duration::from_secs(2),
            max_retries: 0,
        }
    }
}

/// Computes the handshake schedule for one session.
#[derive(Debug, Clone)]
pub struct HandshakeTimer {
    pub config: TimerConfig,
}

impl HandshakeTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self { config }
    }

    /// Total number of INIT transmissions permitted.
    pub fn attempt_budget(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// How long to wait for an ACK on 0-based attempt `attempt`.
    pub fn reply_timeout(&self, attempt: u32) -> Duration {
        self.config
            .ack_timeout
            .saturating_mul(1 << attempt.min(MAX_EXPONENT))
    }

    /// Jittered sleep after `failures` consecutive timeouts (`failures >= 1`).
    pub fn backoff<R: Rng + ?Sized>(&self, failures: u32, rng: &mut R) -> Duration {
        let exponent = failures.saturating_sub(1).min(MAX_EXPONENT);
        let nominal = self.config.base_backoff.saturating_mul(1 << exponent);
        nominal.mul_f64(rng.random_range(JITTER_LOW..JITTER_HIGH))
    }
}
