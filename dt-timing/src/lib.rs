pub mod limiter;
pub mod manual;
pub mod timer;

pub use limiter::FrameLimiter;
pub use manual::ManualTimer;
pub use timer::{CalibrationStats, HighPrecisionTimer, Timer};
