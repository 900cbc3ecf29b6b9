//! Elapsed time, throughput and remaining-time estimates for a bar run.

use std::time::{Duration, Instant};

/// Time statistics for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timing {
    /// Time since the run's first measured tick.
    pub elapsed: Duration,
    /// Estimated time until `total` is reached, rounded to whole seconds.
    pub remaining: Duration,
    /// Items per second.
    pub velocity: f64,
}

impl Timing {
    /// Derives velocity and remaining time from a progress sample.
    ///
    /// Both stay at zero until some time has passed and some progress was
    /// made, so the first frame of a run never divides by zero.
    pub fn estimate(progress: u64, total: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let velocity = if secs > 0.0 {
            progress as f64 / secs
        } else {
            0.0
        };
        let remaining = if velocity > 0.0 {
            let left = total.saturating_sub(progress) as f64;
            Duration::from_secs((left / velocity).round() as u64)
        } else {
            Duration::ZERO
        };
        Self {
            elapsed,
            remaining,
            velocity,
        }
    }
}

/// Measures a run from its first sample.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    epoch: Option<Instant>,
}

impl Stopwatch {
    /// Creates a stopwatch with no epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the epoch. The first call captures the epoch and returns zero.
    pub fn lap(&mut self, now: Instant) -> Duration {
        match self.epoch {
            Some(epoch) => now.saturating_duration_since(epoch),
            None => {
                self.epoch = Some(now);
                Duration::ZERO
            }
        }
    }

    /// Laps now and estimates timing for `progress` out of `total`.
    pub fn sample(&mut self, progress: u64, total: u64) -> Timing {
        let elapsed = self.lap(Instant::now());
        Timing::estimate(progress, total, elapsed)
    }

    /// Instant of the first lap, if any.
    pub fn epoch(&self) -> Option<Instant> {
        self.epoch
    }

    /// Forgets the epoch; the next lap starts a new run.
    pub fn reset(&mut self) {
        self.epoch = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lap_captures_epoch() {
        let mut watch = Stopwatch::new();
        let start = Instant::now();

        assert_eq!(watch.lap(start), Duration::ZERO);
        assert_eq!(watch.epoch(), Some(start));
        assert_eq!(
            watch.lap(start + Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_reset_clears_epoch() {
        let mut watch = Stopwatch::new();
        watch.lap(Instant::now());
        watch.reset();
        assert!(watch.epoch().is_none());
    }

    #[test]
    fn test_estimate_without_elapsed_time() {
        let timing = Timing::estimate(5, 10, Duration::ZERO);
        assert_eq!(timing.velocity, 0.0);
        assert_eq!(timing.remaining, Duration::ZERO);
    }

    #[test]
    fn test_estimate_without_progress() {
        let timing = Timing::estimate(0, 10, Duration::from_secs(3));
        assert_eq!(timing.velocity, 0.0);
        assert_eq!(timing.remaining, Duration::ZERO);
    }

    #[test]
    fn test_estimate_velocity_and_remaining() {
        // 4 items in 2s -> 2 it/s, 6 left -> 3s
        let timing = Timing::estimate(4, 10, Duration::from_secs(2));
        assert_eq!(timing.velocity, 2.0);
        assert_eq!(timing.remaining, Duration::from_secs(3));
        assert_eq!(timing.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn test_estimate_rounds_remaining() {
        // 3 it/s, 5 left -> 1.67s -> 2s
        let timing = Timing::estimate(3, 8, Duration::from_secs(1));
        assert_eq!(timing.remaining, Duration::from_secs(2));
    }
}
