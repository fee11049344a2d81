//! Fixed inter-request delay.
//!
//! Applied once after every dispatched iteration, including ones discarded by
//! a filter or lost to a transport error.

use tokio::time::{sleep, Duration};

use crate::error::ConfigError;

pub const DEFAULT_DELAY_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    delay: Duration,
}

impl Throttle {
    pub fn from_seconds(seconds: f64) -> Result<Self, ConfigError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ConfigError::InvalidDelay(seconds));
        }
        let delay = Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidDelay(seconds))?;
        Ok(Self { delay })
    }

    /// Sleeps for the configured delay. No-op when it is zero.
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay() {
        let throttle = Throttle::from_seconds(DEFAULT_DELAY_SECONDS).unwrap();
        assert_eq!(throttle.delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_too_large_for_duration_is_rejected() {
        assert!(matches!(Throttle::from_seconds(1e20), Err(ConfigError::InvalidDelay(d)) if d == 1e20));
        assert!(Throttle::from_seconds(f64::MAX).is_err());
    }

    #[test]
    fn test_negative_or_nan_delay_is_rejected() {
        assert!(matches!(Throttle::from_seconds(-0.5), Err(ConfigError::InvalidDelay(_))));
        assert!(Throttle::from_seconds(f64::NAN).is_err());
        assert_eq!(Throttle::from_seconds(0.0).unwrap().delay(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_wait_sleeps_for_delay() {
        let throttle = Throttle::from_seconds(0.05).unwrap();
        let start = std::time::Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
