// ── Reconnection scheduling ──
//
// Decides whether and when the channel retries after a loss. The scheduler
// only counts and computes; arming the delayed attempt is the controller's
// job, so this module stays synchronous and trivially testable.

use std::time::Duration;

use rand::Rng;

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Exponential backoff configuration for channel reconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub base_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Automatic attempts allowed before giving up. Default: 5.
    pub max_attempts: u32,

    /// Fraction of each delay that is randomized, `0.0..=1.0`.
    /// Default `0.0` keeps the schedule deterministic.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
            jitter: 0.0,
        }
    }
}

impl ReconnectPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay.is_zero() {
            return Err("base reconnect delay must be > 0".into());
        }
        if self.max_delay < self.base_delay {
            return Err("max reconnect delay must be >= base reconnect delay".into());
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err("jitter must be between 0.0 and 1.0".into());
        }
        Ok(())
    }

    /// Deterministic delay before attempt number `attempt` (1-based).
    ///
    /// `delay = min(base * 2^(attempt - 1), max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// [`delay_for`](Self::delay_for) with the configured jitter applied.
    /// Jitter only ever shortens the delay; values outside `0.0..=1.0` are
    /// clamped.
    fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter.is_nan() || self.jitter <= 0.0 {
            return delay;
        }

        let jitter = self.jitter.min(1.0);
        let roll: f64 = rand::rng().random_range(0.0..=1.0);
        delay.mul_f64(1.0 - jitter + jitter * roll)
    }
}

// ── Decision ─────────────────────────────────────────────────────────

/// Outcome of consulting the scheduler after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Arm attempt number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Budget spent; stay idle until a fresh external connect.
    Exhausted { attempts: u32 },
}

// ── ReconnectScheduler ───────────────────────────────────────────────

/// Retry bookkeeping for one channel.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    attempt_count: u32,
}

impl ReconnectScheduler {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt_count: 0,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn ceiling(&self) -> u32 {
        self.policy.max_attempts
    }

    /// Called on every successful open and on every caller-initiated connect.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Record a failure and decide what happens next.
    ///
    /// The count is incremented before the delay is computed. Once the
    /// incremented count would pass the ceiling the scheduler reports
    /// exhaustion and leaves the count at the ceiling.
    pub fn next_attempt(&mut self) -> Decision {
        let attempt = self.attempt_count.saturating_add(1);
        if attempt > self.policy.max_attempts {
            return Decision::Exhausted {
                attempts: self.attempt_count,
            };
        }

        self.attempt_count = attempt;
        Decision::Retry {
            attempt,
            delay: self.policy.jittered_delay_for(attempt),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
