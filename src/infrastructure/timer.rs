use crate::types::constants::{
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, RECONNECT_GROWTH_FACTOR, RECONNECT_JITTER_MAX,
    RECONNECT_MAX_DELAY,
};
use rand::Rng;
use std::time::Duration;

/// Random source for backoff jitter
pub trait JitterSource: Send {
    /// Returns a delay in `[0, max)`
    fn jitter(&mut self, max: Duration) -> Duration;
}

/// Uniform jitter from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&mut self, max: Duration) -> Duration {
        let max_ms = max.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// Always returns the same jitter, clamped to `max`
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub Duration);

impl JitterSource for FixedJitter {
    fn jitter(&mut self, max: Duration) -> Duration {
        self.0.min(max)
    }
}

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub growth_factor: f64,
    pub jitter_max: Duration,
    pub max_delay: Duration,
    /// Automatic attempts per episode; 0 disables automatic reconnection
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY),
            growth_factor: RECONNECT_GROWTH_FACTOR,
            jitter_max: Duration::from_millis(RECONNECT_JITTER_MAX),
            max_delay: Duration::from_millis(RECONNECT_MAX_DELAY),
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Exponential backoff with jitter and an attempt limit
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    jitter: Box<dyn JitterSource>,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self::with_jitter(config, Box::new(ThreadRngJitter))
    }

    pub fn with_jitter(config: ReconnectConfig, jitter: Box<dyn JitterSource>) -> Self {
        Self { config, jitter }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Whether another automatic attempt is allowed after `attempts` have been made
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.config.max_attempts
    }

    /// `min(base * growth^attempt + jitter, max_delay)`
    pub fn compute_delay(&mut self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown_ms = base_ms * self.config.growth_factor.powi(exponent);
        let jitter_ms = self.jitter.jitter(self.config.jitter_max).as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;

        let delay_ms = (grown_ms + jitter_ms).min(max_ms);
        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
