use std::time::Instant;

use crate::shared::constants::{FPS_DISPLAY_CEILING, STATS_WINDOW_MS};

/// Rolling average of inference latency, published once per window as an
/// instantaneous FPS value.
#[derive(Debug, Clone)]
pub struct InferenceStats {
    sum_latency_ms: f64,
    count: u32,
    window_start: Instant,
    window_ms: f64,
    ceiling: f64,
}

impl InferenceStats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(window_start: Instant) -> Self {
        Self {
            sum_latency_ms: 0.0,
            count: 0,
            window_start,
            window_ms: STATS_WINDOW_MS,
            ceiling: FPS_DISPLAY_CEILING,
        }
    }

    pub fn begin_sample(&self) -> Instant {
        Instant::now()
    }

    /// Records one sample. Returns the FPS to publish when the window elapsed.
    pub fn end_sample(&mut self, start: Instant) -> Option<f64> {
        self.end_sample_at(start, Instant::now())
    }

    pub fn end_sample_at(&mut self, start: Instant, now: Instant) -> Option<f64> {
        self.sum_latency_ms += now.saturating_duration_since(start).as_secs_f64() * 1000.0;
        self.count += 1;

        let window_elapsed = now.saturating_duration_since(self.window_start).as_secs_f64() * 1000.0;
        if window_elapsed < self.window_ms {
            return None;
        }

        let fps = if self.count == 0 {
            0.0
        } else {
            let average = self.sum_latency_ms / f64::from(self.count);
            if average > 0.0 {
                (1000.0 / average).min(self.ceiling)
            } else {
                self.ceiling
            }
        };
        self.sum_latency_ms = 0.0;
        self.count = 0;
        self.window_start = now;
        Some(fps)
    }

    pub fn sum_latency_ms(&self) -> f64 {
        self.sum_latency_ms
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Default for InferenceStats {
    fn default() -> Self {
        Self::new()
    }
}
