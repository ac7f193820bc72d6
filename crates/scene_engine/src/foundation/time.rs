//! Frame timing

use std::time::{Duration, Instant};

/// Frame clock producing per-frame delta times
pub struct FrameClock {
    last_frame: Instant,
    delta_time: f32,
    frame_count: u64,
    max_delta: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock starting now. Deltas are clamped to a quarter second so
    /// a stall (window drag, reload) does not fling the camera.
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            frame_count: 0,
            max_delta: 0.25,
        }
    }

    /// Advance the clock; call once per frame
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32().min(self.max_delta);
        self.last_frame = now;
        self.frame_count += 1;
        self.delta_time
    }

    /// Seconds elapsed between the last two ticks
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Stopwatch measuring wall time of blocking operations (loads, recompiles)
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    /// Start a new stopwatch
    pub fn start_new() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed milliseconds since start
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_counts_ticks() {
        let mut clock = FrameClock::new();
        clock.tick();
        clock.tick();
        assert_eq!(clock.frame_count(), 2);
        assert!(clock.delta_time() >= 0.0);
        assert!(clock.delta_time() <= 0.25);
    }
}
