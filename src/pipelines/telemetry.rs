// SPDX-License-Identifier: GPL-3.0-only

//! Render-rate telemetry

use crate::constants::{FPS_AVERAGE_WINDOW, MAX_REPORTED_FPS};
use std::collections::VecDeque;
use std::time::Instant;

/// Instantaneous frame rate from the interval between two rendered frames
#[derive(Debug, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rendered frame at `now`.
    ///
    /// Returns `None` for the first frame, otherwise `1 / dt` clamped to
    /// `0..=MAX_REPORTED_FPS`.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        let previous = self.last.replace(now)?;
        let elapsed = now.saturating_duration_since(previous).as_secs_f32();
        if elapsed <= 0.0 {
            return Some(MAX_REPORTED_FPS);
        }
        Some((1.0 / elapsed).clamp(0.0, MAX_REPORTED_FPS))
    }
}

/// Moving average over the last few FPS samples
#[derive(Debug)]
pub struct FpsAverager {
    samples: VecDeque<f32>,
    window: usize,
}

impl FpsAverager {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    /// Add a sample and return the current average
    pub fn push(&mut self, fps: f32) -> f32 {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
        self.average()
    }

    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }
}

impl Default for FpsAverager {
    fn default() -> Self {
        Self::new(FPS_AVERAGE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_tick_has_no_rate() {
        let mut meter = FpsMeter::new();
        assert_eq!(meter.tick(Instant::now()), None);
    }

    #[test]
    fn test_rate_from_interval() {
        let mut meter = FpsMeter::new();
        let start = Instant::now();
        meter.tick(start);
        let fps = meter.tick(start + Duration::from_millis(40)).unwrap();
        assert!((fps - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_rate_is_clamped() {
        let mut meter = FpsMeter::new();
        let start = Instant::now();
        meter.tick(start);
        assert_eq!(meter.tick(start + Duration::from_micros(100)), Some(120.0));
        assert_eq!(meter.tick(start + Duration::from_micros(100)), Some(120.0));
    }

    #[test]
    fn test_average_window() {
        let mut avg = FpsAverager::new(10);
        for _ in 0..10 {
            avg.push(10.0);
        }
        assert_eq!(avg.average(), 10.0);
        // Ten samples of 30 push every 10 out of the window
        for _ in 0..10 {
            avg.push(30.0);
        }
        assert_eq!(avg.average(), 30.0);
        assert_eq!(FpsAverager::new(2).push(4.0), 4.0);
    }
}
