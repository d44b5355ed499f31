//! Randomised delays between loop iterations

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::task::yield_now;
use tokio::time::sleep;

/// Invalid pacing bounds
#[derive(Error, Debug, PartialEq)]
pub enum PacingError {
    /// One of the bounds is negative, NaN or infinite
    #[error("pacing bound {0} is not a finite, non-negative number of seconds")]
    InvalidBound(f64),
    /// Lower bound exceeds the upper bound
    #[error("lower pacing bound ({min}s) exceeds upper bound ({max}s)")]
    Inverted {
        /// Lower bound in seconds
        min: f64,
        /// Upper bound in seconds
        max: f64,
    },
}

/// Uniformly distributed delay between a lower and an upper bound (both inclusive)
///
/// Pacing emulates arrival or processing time. It is not a backpressure mechanism,
/// nothing slows a producer down when a consumer falls behind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Creates a new pacing from two durations
    pub fn new(min: Duration, max: Duration) -> Result<Self, PacingError> {
        if min > max {
            return Err(PacingError::Inverted {
                min: min.as_secs_f64(),
                max: max.as_secs_f64(),
            });
        }

        Ok(Self { min, max })
    }

    /// Creates a new pacing from bounds given in (fractional) seconds
    pub fn from_secs_f64(min: f64, max: f64) -> Result<Self, PacingError> {
        for bound in [min, max] {
            if !bound.is_finite() || bound < 0.0 {
                return Err(PacingError::InvalidBound(bound));
            }
        }

        Pacing::new(Duration::from_secs_f64(min), Duration::from_secs_f64(max))
    }

    /// Pacing that never delays
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Lower bound
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let seconds = rand::thread_rng().gen_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(seconds)
    }

    /// Suspends the current task for the next delay
    pub async fn pause(&self) {
        let delay = self.next_delay();

        if delay.is_zero() {
            yield_now().await;
        } else {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_stay_within_bounds() {
        let pacing = Pacing::from_secs_f64(0.5, 2.0).unwrap();

        for _ in 0..1000 {
            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_secs(2));
        }
    }

    #[test]
    fn equal_bounds_are_constant() {
        let pacing = Pacing::from_secs_f64(0.25, 0.25).unwrap();
        assert_eq!(pacing.next_delay(), Duration::from_millis(250));
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert_eq!(
            Pacing::from_secs_f64(2.0, 0.5),
            Err(PacingError::Inverted { min: 2.0, max: 0.5 })
        );
    }

    #[test]
    fn negative_or_nan_bounds_are_rejected() {
        assert_eq!(
            Pacing::from_secs_f64(-1.0, 0.5),
            Err(PacingError::InvalidBound(-1.0))
        );
        assert!(Pacing::from_secs_f64(0.0, f64::NAN).is_err());
        assert!(Pacing::from_secs_f64(0.0, f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn zero_pacing_returns_immediately() {
        tokio::time::timeout(Duration::from_millis(100), Pacing::none().pause())
            .await
            .expect("zero pacing should not sleep");
    }
}
