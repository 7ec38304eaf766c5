//! Poll configuration and the backoff sequence.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of status checks per session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;
/// Default wait after the first unfinished attempt.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(2000);
/// Default upper bound of the wait between attempts.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(10000);
/// Growth factor of the wait between attempts.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Poll session limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    /// Status checks before giving up.
    #[serde(default = "PollConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Wait after the first unfinished attempt (e.g., "2s").
    #[serde(default = "PollConfig::default_initial_interval", with = "humantime_serde")]
    pub initial_interval: Duration,
    /// Upper bound of the wait between attempts (e.g., "10s").
    #[serde(default = "PollConfig::default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

impl PollConfig {
    fn default_max_attempts() -> u32 {
        DEFAULT_MAX_ATTEMPTS
    }

    fn default_initial_interval() -> Duration {
        DEFAULT_INITIAL_INTERVAL
    }

    fn default_max_interval() -> Duration {
        DEFAULT_MAX_INTERVAL
    }

    /// Reject zero attempts, zero intervals and `initial_interval > max_interval`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }
        if self.initial_interval.is_zero()
            || self.max_interval.is_zero()
            || self.initial_interval > self.max_interval
        {
            return Err(ConfigError::InvalidPollInterval {
                initial: self.initial_interval,
                max: self.max_interval,
            });
        }
        Ok(())
    }

    /// The sleep sequence a session with these limits follows.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_interval, self.max_interval)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }
}

/// Endless, non-decreasing sequence of waits capped at a maximum.
///
/// Both the poll loop and [`estimate_max_poll_time`] draw their intervals
/// from this iterator.
///
/// ```
/// use std::time::Duration;
/// use backstop::poll::Backoff;
///
/// let waits: Vec<u64> = Backoff::new(Duration::from_secs(2), Duration::from_secs(10))
///     .take(6)
///     .map(|d| d.as_millis() as u64)
///     .collect();
/// assert_eq!(waits, [2000, 3000, 4500, 6750, 10000, 10000]);
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    /// Start at `initial`, never exceeding `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Current wait, then advance.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(delay.as_secs_f64() * BACKOFF_MULTIPLIER)
            .unwrap_or(self.max)
            .min(self.max);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Worst-case time a session spends sleeping before it gives up.
///
/// The poll loop returns as soon as its final attempt still reports
/// [`Processing`](backstop_core::TaskStatus::Processing) instead of sleeping
/// once more, so this is the sum of the first `max_attempts - 1` intervals
/// rather than `max_attempts` of them. A loop that sleeps after every
/// non-terminal status would wait one extra interval before timing out.
pub fn estimate_max_poll_time(config: &PollConfig) -> Duration {
    let sleeps = config.max_attempts.saturating_sub(1) as usize;
    config.backoff().take(sleeps).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(durations: impl Iterator<Item = Duration>) -> Vec<u128> {
        durations.map(|d| d.as_millis()).collect()
    }

    #[test]
    fn test_default_backoff_sequence() {
        let backoff = PollConfig::default().backoff();
        assert_eq!(
            millis(backoff.take(7)),
            vec![2000, 3000, 4500, 6750, 10000, 10000, 10000]
        );
    }

    #[test]
    fn test_initial_above_max_is_clamped() {
        let backoff = Backoff::new(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(millis(backoff.take(2)), vec![5000, 5000]);
    }

    #[test]
    fn test_backoff_never_decreases() {
        let delays: Vec<Duration> =
            Backoff::new(Duration::from_millis(7), Duration::from_millis(900))
                .take(40)
                .collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(900)));
    }

    #[test]
    fn test_estimate_matches_sleep_sequence() {
        let config = PollConfig {
            max_attempts: 6,
            ..PollConfig::default()
        };
        // 2000 + 3000 + 4500 + 6750 + 10000
        assert_eq!(estimate_max_poll_time(&config), Duration::from_millis(26250));

        let single = PollConfig {
            max_attempts: 1,
            ..PollConfig::default()
        };
        assert_eq!(estimate_max_poll_time(&single), Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(PollConfig::default().validate().is_ok());
        assert!(matches!(
            PollConfig {
                max_attempts: 0,
                ..PollConfig::default()
            }
            .validate(),
            Err(ConfigError::InvalidMaxAttempts(0))
        ));
        let inverted = PollConfig {
            initial_interval: Duration::from_secs(20),
            ..PollConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidPollInterval { .. })
        ));
    }
}
