// Timekeeping helpers for logging and frame profiling
//
// Austin Shafer - 2025
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch
///
/// This is what gets stamped on every log line. It will
/// not go backwards unless the system clock does.
pub fn get_current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time is before the unix epoch")
        .as_millis() as u64
}

/// A basic stopwatch for timing sections of code
///
/// Call `start`, do work, call `end`, and `get_duration`
/// reports how long the work took.
pub struct StopWatch {
    sw_start: Instant,
    sw_duration: Duration,
}

impl StopWatch {
    pub fn new() -> Self {
        Self {
            sw_start: Instant::now(),
            sw_duration: Duration::new(0, 0),
        }
    }

    pub fn start(&mut self) {
        self.sw_start = Instant::now();
    }

    pub fn end(&mut self) {
        self.sw_duration = self.sw_start.elapsed();
    }

    pub fn get_duration(&self) -> Duration {
        self.sw_duration
    }
}
