use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Trait for high-precision monotonic timers
pub trait Timer: Clone + Send + Sync {
    type Timestamp: Copy + Clone + Send + Sync;
    fn now(&self) -> Self::Timestamp;
    fn elapsed(&self, ts: Self::Timestamp) -> Duration;
    fn sleep(&self, d: Duration);
    fn record_frame(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStats {
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

impl CalibrationStats {
    pub fn from_frames<'a, I>(frames: I) -> Self
    where
        I: IntoIterator<Item = &'a Duration>,
    {
        let times: Vec<f64> = frames.into_iter().map(|d| d.as_nanos() as f64).collect();
        if times.is_empty() {
            return CalibrationStats::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

/// Wall-independent nanosecond clock anchored at construction.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
    pub frame_times: VecDeque<Duration>,
    pub max_samples: usize,
}

impl Timer for HighPrecisionTimer {
    type Timestamp = u64;
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
    fn record_frame(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }
    fn calibration_stats(&self) -> CalibrationStats {
        CalibrationStats::from_frames(&self.frame_times)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_times: VecDeque::with_capacity(1000),
            max_samples: 1000,
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        self.spin_sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{CLOCK_MONOTONIC, clock_nanosleep, timespec};

        let req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };

        unsafe {
            clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
        }
    }

    // Coarse OS sleep, then spin out the last stretch.
    #[cfg(not(target_os = "linux"))]
    fn spin_sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        if duration > Duration::from_millis(2) {
            std::thread::sleep(duration - Duration::from_millis(1));
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_from_uniform_frames() {
        let frames = vec![Duration::from_micros(500); 4];
        let stats = CalibrationStats::from_frames(&frames);
        assert_eq!(stats.average_frame_time_ns, 500_000.0);
        assert_eq!(stats.jitter_ns, 0.0);
        assert_eq!(stats.effective_fps, 2000.0);
    }

    #[test]
    fn frame_history_is_bounded() {
        let mut t = HighPrecisionTimer::new();
        t.max_samples = 3;
        for ms in 1..=5 {
            t.record_frame(Duration::from_millis(ms));
        }
        assert_eq!(t.frame_times.len(), 3);
        assert_eq!(t.frame_times.front(), Some(&Duration::from_millis(3)));
    }

    #[test]
    fn sleep_is_monotonic() {
        let t = HighPrecisionTimer::new();
        let before = t.now();
        t.sleep(Duration::from_millis(2));
        assert!(t.elapsed(before) >= Duration::from_millis(2));
    }
}
