use crate::timer::Timer;
use std::time::Duration;

/// Caps the engine tick rate, busy-loop style, well above display refresh so
/// latency resolution is not bound to vsync.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    min_period: Duration,
    last_ns: Option<u64>,
}

impl FrameLimiter {
    pub fn new(max_hz: u32) -> Self {
        Self {
            min_period: Duration::from_nanos(1_000_000_000 / u64::from(max_hz.max(1))),
            last_ns: None,
        }
    }

    pub fn min_period(&self) -> Duration {
        self.min_period
    }

    /// Sleeps out the rest of the current tick and records its length.
    pub fn pace<T: Timer<Timestamp = u64>>(&mut self, timer: &mut T) -> Duration {
        let Some(last) = self.last_ns else {
            self.last_ns = Some(timer.now());
            return Duration::ZERO;
        };
        let spent = timer.elapsed(last);
        if spent < self.min_period {
            timer.sleep(self.min_period - spent);
        }
        let frame = timer.elapsed(last);
        timer.record_frame(frame);
        self.last_ns = Some(timer.now());
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manual::ManualTimer;

    #[test]
    fn short_ticks_are_stretched_to_the_ceiling() {
        let mut timer = ManualTimer::new();
        let mut limiter = FrameLimiter::new(2000);
        assert_eq!(limiter.pace(&mut timer), Duration::ZERO);

        timer.advance(Duration::from_micros(100));
        assert_eq!(limiter.pace(&mut timer), Duration::from_micros(500));
    }

    #[test]
    fn long_ticks_are_not_padded() {
        let mut timer = ManualTimer::new();
        let mut limiter = FrameLimiter::new(2000);
        limiter.pace(&mut timer);
        timer.advance(Duration::from_millis(3));
        assert_eq!(limiter.pace(&mut timer), Duration::from_millis(3));
        assert_eq!(timer.calibration_stats().average_frame_time_ns, 3_000_000.0);
    }
}
