//! # Jitter for retry delays.
//!
//! Randomizes the worker's retry delay so several buses sharing a host do not
//! hammer a recovering resource in lockstep.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2 + uniform[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied on top of a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as is.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Half fixed, half random.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to `delay`; the result never exceeds `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(Self::up_to(ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + Self::up_to(ms - half))
            }
        }
    }

    fn up_to(hi_ms: u64) -> u64 {
        if hi_ms == 0 {
            return 0;
        }
        rand::rng().random_range(0..=hi_ms)
    }
}
