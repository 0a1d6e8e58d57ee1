//! Restart delay for a failing pipeline.
//!
//! The delay starts at `floor`, grows by `factor` for every consecutive
//! attempt that relayed nothing and is clamped to `cap`. An attempt that
//! relayed at least one byte resets it to `floor`.

use std::time::Duration;

use crate::config::StreamSettings;

#[derive(Clone, Debug)]
pub struct RestartBackoff {
    floor: Duration,
    cap: Duration,
    factor: f64,
    current: Option<Duration>,
}

impl RestartBackoff {
    pub fn new(floor: Duration, cap: Duration, factor: f64) -> Self {
        Self {
            floor: floor.min(cap),
            cap,
            factor,
            current: None,
        }
    }

    pub fn from_settings(settings: &StreamSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.backoff_floor_ms),
            Duration::from_millis(settings.backoff_cap_ms),
            settings.backoff_factor,
        )
    }

    /// Delay to observe before the next respawn.
    pub fn next_delay(&mut self, relayed_bytes: bool) -> Duration {
        let delay = match self.current {
            Some(previous) if !relayed_bytes => {
                let grown = previous.as_secs_f64() * self.factor;
                if !grown.is_finite() || grown >= self.cap.as_secs_f64() {
                    self.cap
                } else {
                    Duration::from_secs_f64(grown)
                }
            }
            _ => self.floor,
        };
        self.current = Some(delay);
        delay
    }

    /// Delay that was handed out last, if any.
    pub fn current(&self) -> Option<Duration> {
        self.current
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10), 1.7)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delay_is_floor() {
        let mut backoff = RestartBackoff::default();
        assert_eq!(backoff.current(), None);
        assert_eq!(backoff.next_delay(false), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_attempts_strictly_increase_to_cap() {
        let mut backoff = RestartBackoff::default();
        let mut previous = backoff.next_delay(false);
        let mut reached_cap = false;

        for _ in 0..20 {
            let delay = backoff.next_delay(false);
            assert!(delay <= Duration::from_secs(10));
            if previous < Duration::from_secs(10) {
                assert!(delay > previous, "{:?} should exceed {:?}", delay, previous);
            } else {
                assert_eq!(delay, Duration::from_secs(10));
                reached_cap = true;
            }
            previous = delay;
        }
        assert!(reached_cap);
    }

    #[test]
    fn test_growth_factor() {
        let mut backoff = RestartBackoff::default();
        backoff.next_delay(false);
        let second = backoff.next_delay(false);
        assert!((second.as_secs_f64() - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_relayed_bytes_reset_to_floor() {
        let mut backoff = RestartBackoff::default();
        for _ in 0..6 {
            backoff.next_delay(false);
        }
        assert!(backoff.current().unwrap() > Duration::from_secs(5));

        assert_eq!(backoff.next_delay(true), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(true), Duration::from_secs(1));
    }

    #[test]
    fn test_floor_above_cap_is_clamped() {
        let mut backoff =
            RestartBackoff::new(Duration::from_secs(20), Duration::from_secs(5), 2.0);
        assert_eq!(backoff.next_delay(false), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(false), Duration::from_secs(5));
    }
}
