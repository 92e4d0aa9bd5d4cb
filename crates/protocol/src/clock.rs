/// Coarse elapsed-time counter driven by video frame arrivals.
///
/// Advances by one tick every `frames_per_tick` frames, so it is only as
/// accurate as the stream's frame rate is steady.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frames_per_tick: u32,
    frames: u64,
    ticks: u64,
}

impl FrameClock {
    pub fn new(frames_per_tick: u32) -> Self {
        Self {
            frames_per_tick: frames_per_tick.max(1),
            frames: 0,
            ticks: 0,
        }
    }

    /// Count one frame. Returns the new tick count when it moved.
    pub fn advance(&mut self) -> Option<u64> {
        self.frames += 1;
        if self.frames.is_multiple_of(u64::from(self.frames_per_tick)) {
            self.ticks += 1;
            Some(self.ticks)
        } else {
            None
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.ticks = 0;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(30)
    }
}
