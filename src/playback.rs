use crate::frame::ImageBuffer;
use std::time::Duration;

/// Adaptive frame selection for pre-recorded input.
///
/// Frames between selected indices are never decoded into the pipeline: the
/// session seeks straight to `current_frame_index` each iteration.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    source_fps: f32,
    target_fps: f32,
    frame_skip: u64,
    current_frame_index: u64,
    last_processed: Option<ImageBuffer>,
}

impl PlaybackState {
    pub fn new(source_fps: f32, target_fps: f32) -> Self {
        let source_fps = if source_fps.is_finite() && source_fps > 0.0 {
            source_fps
        } else {
            30.0
        };
        let mut state = Self {
            source_fps,
            target_fps: source_fps,
            frame_skip: 1,
            current_frame_index: 0,
            last_processed: None,
        };
        state.set_target_fps(target_fps);
        state
    }

    /// Camera input: every frame is processed at the device rate.
    pub fn live(fps: f32) -> Self {
        Self::new(fps, fps)
    }

    pub fn source_fps(&self) -> f32 {
        self.source_fps
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    pub fn current_frame_index(&self) -> u64 {
        self.current_frame_index
    }

    pub fn last_processed(&self) -> Option<&ImageBuffer> {
        self.last_processed.as_ref()
    }

    pub fn set_last_processed(&mut self, frame: ImageBuffer) {
        self.last_processed = Some(frame);
    }

    /// Clamp to `[1, source_fps]` and recompute the skip stride.
    pub fn set_target_fps(&mut self, fps: f32) {
        let fps = if fps.is_finite() { fps } else { self.source_fps };
        self.target_fps = fps.clamp(1.0_f32.min(self.source_fps), self.source_fps);
        self.frame_skip = compute_frame_skip(self.source_fps, self.target_fps);
    }

    pub fn adjust_target_fps(&mut self, delta: f32) {
        self.set_target_fps(self.target_fps + delta);
    }

    /// Move past the frame that was just processed.
    pub fn advance(&mut self) {
        self.current_frame_index += self.frame_skip;
    }

    /// End of stream: restart from the first frame and drop the cached
    /// output so the next iteration reprocesses immediately.
    pub fn loop_reset(&mut self) {
        self.current_frame_index = 0;
        self.last_processed = None;
    }

    /// Display pacing interval at the target rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.target_fps.max(1.0))
    }
}

/// `max(1, round(source / target))`. Rounds rather than floors: 30 fps
/// shown at 20 skips 2 (floor would give 1).
pub fn compute_frame_skip(source_fps: f32, target_fps: f32) -> u64 {
    if !(source_fps > 0.0) || !(target_fps > 0.0) {
        return 1;
    }
    ((source_fps / target_fps).round() as u64).max(1)
}

/// Fixed every-Nth processing for batch export; skipped positions reuse
/// the last processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldSchedule {
    every_n: u64,
}

impl HoldSchedule {
    pub fn new(every_n: u64) -> Self {
        Self {
            every_n: every_n.max(1),
        }
    }

    pub fn every_n(&self) -> u64 {
        self.every_n
    }

    pub fn should_process(&self, frame_index: u64) -> bool {
        frame_index % self.every_n == 0
    }

    /// Number of frames that get processed out of `total`.
    pub fn processed_count(&self, total: u64) -> u64 {
        total.div_ceil(self.every_n)
    }
}
