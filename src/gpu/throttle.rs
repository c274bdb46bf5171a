//! Sort-every-Nth-frame throttle for the GPU backend.
//!
//! Skipped frames keep drawing with the previous order. During fast camera
//! motion that order is briefly stale, but still close enough to blend.

/// Decides, frame by frame, whether the GPU sort runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortThrottle {
    rate: u32,
    frame: u64,
}

impl SortThrottle {
    /// Sort every `rate` frames. 0 and 1 both mean every frame.
    pub fn new(rate: u32) -> Self {
        Self { rate, frame: 0 }
    }

    /// Advance one frame and report whether to sort on it.
    ///
    /// The first frame always sorts so there is an order to draw with.
    pub fn should_sort(&mut self) -> bool {
        self.frame += 1;
        !(self.rate > 1 && self.frame > 1 && self.frame % u64::from(self.rate) != 0)
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Frames seen so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Start over, so the next frame sorts (e.g. after the cloud changes).
    pub fn reset(&mut self) {
        self.frame = 0;
    }
}
