//! Lock-free peak metering.

use crate::{AtomicFloat, AudioBuffer};

/// Linear gain to dBFS. Silence maps to negative infinity.
#[inline]
pub fn to_dbfs(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Last buffer's per-side peaks, written by the audio thread.
#[derive(Debug)]
pub struct PeakMeter {
    peak_left: AtomicFloat,
    peak_right: AtomicFloat,
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakMeter {
    pub fn new() -> Self {
        Self {
            peak_left: AtomicFloat::new(0.0),
            peak_right: AtomicFloat::new(0.0),
        }
    }

    /// Measures the first `frames` frames of `buf`. Mono buffers feed both sides.
    #[inline]
    pub fn update(&self, buf: &AudioBuffer, frames: usize) {
        let frames = frames.min(buf.frames());
        let channels = buf.channels();
        if channels == 0 {
            return;
        }
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for frame in 0..frames {
            left = left.max(buf.get(frame, 0).abs());
            right = right.max(buf.get(frame, (channels - 1).min(1)).abs());
        }
        self.peak_left.set(left);
        self.peak_right.set(right);
    }

    #[inline]
    pub fn get(&self) -> (f32, f32) {
        (self.peak_left.get(), self.peak_right.get())
    }

    /// Louder side, linear.
    #[inline]
    pub fn peak(&self) -> f32 {
        self.peak_left.get().max(self.peak_right.get())
    }

    pub fn peak_dbfs(&self) -> f32 {
        to_dbfs(self.peak())
    }

    pub fn reset(&self) {
        self.peak_left.set(0.0);
        self.peak_right.set(0.0);
    }
}
