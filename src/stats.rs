// Frame statistics
//
// Counts presented frames and reports a rate once per elapsed second.

use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    pub fps: f32,
    /// Duration of the last frame in milliseconds
    pub frame_ms: f32,
}

#[derive(Debug)]
pub struct FpsCounter {
    frame_count: u32,
    last_frame: Instant,
    last_report: Instant,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_frame: now,
            last_report: now,
        }
    }

    /// Record one presented frame. Returns a report when a full interval has
    /// elapsed since the previous one.
    pub fn frame(&mut self, now: Instant) -> Option<FpsReport> {
        let frame_time = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < REPORT_INTERVAL {
            return None;
        }

        let report = FpsReport {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_ms: frame_time.as_secs_f32() * 1000.0,
        };
        self.frame_count = 0;
        self.last_report = now;
        Some(report)
    }
}
