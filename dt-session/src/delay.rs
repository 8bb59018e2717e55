use crate::config::DelaySpec;
use dt_core::Classification;
use std::collections::VecDeque;
use std::time::Duration;

/// Sliding window of recent latencies driving the adaptive pace.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl AdaptiveWindow {
    /// A full window of `capacity` copies of `baseline`.
    pub fn seeded(baseline: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: std::iter::repeat_n(baseline, capacity).collect(),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn mean(&self) -> Duration {
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Duration> {
        self.samples.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DelayPolicy {
    Fixed(Duration),
    Adaptive(AdaptiveWindow),
    /// No deadline; the next stimulus waits for an answer.
    SelfPaced,
}

impl DelayPolicy {
    pub fn from_spec(spec: &DelaySpec) -> Self {
        match *spec {
            DelaySpec::Fixed { interval_ms } => Self::Fixed(Duration::from_millis(interval_ms)),
            DelaySpec::Adaptive { baseline_ms, window } => Self::Adaptive(AdaptiveWindow::seeded(
                Duration::from_millis(baseline_ms),
                window,
            )),
            DelaySpec::SelfPaced => Self::SelfPaced,
        }
    }

    /// Delay for a stimulus starting now. It is frozen at onset.
    pub fn current(&self) -> Option<Duration> {
        match self {
            Self::Fixed(d) => Some(*d),
            Self::Adaptive(window) => Some(window.mean()),
            Self::SelfPaced => None,
        }
    }

    /// Feeds an outcome back into the pace. `active` is the delay the
    /// stimulus was presented with; failures cost twice that.
    pub fn observe(&mut self, classification: Classification, latency: Duration, active: Option<Duration>) {
        let Self::Adaptive(window) = self else {
            return;
        };
        match classification {
            Classification::Correct => window.push(latency),
            Classification::Incorrect | Classification::Late | Classification::Missed => {
                if let Some(active) = active {
                    window.push(active * 2);
                }
            }
            Classification::Repeated => {}
        }
    }

    pub fn window(&self) -> Option<&AdaptiveWindow> {
        match self {
            Self::Adaptive(window) => Some(window),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive() -> DelayPolicy {
        DelayPolicy::from_spec(&DelaySpec::Adaptive {
            baseline_ms: 1078,
            window: 8,
        })
    }

    #[test]
    fn seeded_window_starts_at_baseline() {
        let policy = adaptive();
        assert_eq!(policy.current(), Some(Duration::from_millis(1078)));
        assert_eq!(policy.window().map(AdaptiveWindow::len), Some(8));
    }

    #[test]
    fn correct_answers_speed_up_the_pace() {
        let mut policy = adaptive();
        for _ in 0..8 {
            policy.observe(
                Classification::Correct,
                Duration::from_millis(400),
                policy.current(),
            );
        }
        assert_eq!(policy.current(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn failures_cost_twice_the_frozen_delay() {
        let mut policy = adaptive();
        policy.observe(
            Classification::Missed,
            Duration::ZERO,
            Some(Duration::from_millis(1000)),
        );
        let window = policy.window().unwrap();
        assert_eq!(window.len(), 8);
        assert_eq!(window.samples().last(), Some(&Duration::from_millis(2000)));
    }

    #[test]
    fn repeated_presses_leave_the_window_alone() {
        let mut policy = adaptive();
        let before = policy.clone();
        policy.observe(
            Classification::Repeated,
            Duration::from_millis(5),
            policy.current(),
        );
        assert_eq!(policy, before);
    }

    #[test]
    fn fixed_and_self_paced_ignore_outcomes() {
        let mut fixed = DelayPolicy::from_spec(&DelaySpec::Fixed { interval_ms: 1500 });
        fixed.observe(Classification::Missed, Duration::ZERO, fixed.current());
        assert_eq!(fixed.current(), Some(Duration::from_millis(1500)));
        assert_eq!(DelayPolicy::from_spec(&DelaySpec::SelfPaced).current(), None);
    }
}
