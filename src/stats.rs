//! FPS/buffer-count instrumentation sampled every 2s (§5 "Timing").

use std::time::Instant;

pub struct Stats {
    pub buffers_processed: u64,
    window_start: Instant,
    window_count: u64,
    pub last_fps: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            buffers_processed: 0,
            window_start: Instant::now(),
            window_count: 0,
            last_fps: 0.0,
        }
    }

    pub fn buffer_processed(&mut self) {
        self.buffers_processed += 1;
        self.window_count += 1;
    }

    /// Called once per loop iteration; emits a rate every 2s.
    pub fn tick(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed.as_secs_f64() >= 2.0 {
            self.last_fps = self.window_count as f64 / elapsed.as_secs_f64();
            log::debug!("fps: {:.1}", self.last_fps);
            self.window_count = 0;
            self.window_start = Instant::now();
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
