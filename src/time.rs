//! Frame timing

use std::time::{Duration, Instant};

/// Frames are averaged over windows at least this long
const MEASURE_WINDOW: Duration = Duration::from_secs(1);

/// Counts frames and measures per-frame and total elapsed time.
///
/// Every method has an `_at` form taking the current instant, so callers
/// with their own clock (and tests) can drive it.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    fps: f32,
    // -1 until the first frame opens a window
    frames: i64,
    window_start: Instant,
    last_frame: Instant,
    time_elapsed: f32,
    total_time_elapsed: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            fps: 0.0,
            frames: -1,
            window_start: now,
            last_frame: now,
            time_elapsed: 0.0,
            total_time_elapsed: 0.0,
        }
    }

    pub fn next_frame(&mut self) {
        self.next_frame_at(Instant::now());
    }

    pub fn next_frame_at(&mut self, now: Instant) {
        self.frames += 1;
        self.time_elapsed = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.total_time_elapsed += self.time_elapsed;

        if self.frames == 0 {
            self.window_start = now;
            return;
        }
        let window = now.saturating_duration_since(self.window_start);
        if window > MEASURE_WINDOW {
            self.fps = self.frames as f32 / window.as_secs_f32();
            self.window_start = now;
            self.frames = 0;
        }
    }

    /// Frames per second over the last completed window
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Seconds between the last two frames
    pub fn time_elapsed(&self) -> f32 {
        self.time_elapsed
    }

    /// Seconds since the counter was created
    pub fn total_time_elapsed(&self) -> f32 {
        self.total_time_elapsed
    }

    /// Zero the per-frame time, e.g. after a pause, so the next frame does
    /// not see the gap.
    pub fn reset_time_elapsed(&mut self) {
        self.reset_time_elapsed_at(Instant::now());
    }

    pub fn reset_time_elapsed_at(&mut self, now: Instant) {
        self.time_elapsed = 0.0;
        self.total_time_elapsed += now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
    }

    /// Whole frames above 100 fps, three significant digits below
    pub fn fps_string(&self) -> String {
        format_fps(self.fps)
    }
}

fn format_fps(fps: f32) -> String {
    if fps > 100.0 {
        return format!("{}", fps as i64);
    }
    if fps <= 0.0 {
        return "0".to_string();
    }
    let digits = fps.log10().floor() as i32 + 1;
    let decimals = (3 - digits).max(0) as usize;
    let text = format!("{:.*}", decimals, fps);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
