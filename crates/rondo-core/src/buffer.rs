//! Interleaved f32 audio buffer.
//!
//! Devices hand the engine interleaved blocks, so the engine renders
//! interleaved too: `data[frame * channels + ch]`. Buffers are allocated once
//! at reset; every method used from the audio thread works in place.

/// Per-side gains produced by the mixer's pan law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pan {
    pub left: f32,
    pub right: f32,
}

impl Pan {
    pub const CENTER: Pan = Pan {
        left: 1.0,
        right: 1.0,
    };

    /// Linear pan law: center is pass-through, anything else is `(1 - pan, pan)`.
    ///
    /// Not constant power: just off center the gains drop from `(1, 1)` to
    /// about `(0.5, 0.5)`, then move linearly to `(1, 0)` at hard left and
    /// `(0, 1)` at hard right.
    #[inline]
    pub fn linear(pan: f32) -> Self {
        if pan == 0.5 {
            return Self::CENTER;
        }
        Self {
            left: 1.0 - pan,
            right: pan,
        }
    }

    #[inline]
    fn gain(&self, ch: usize) -> f32 {
        match ch {
            0 => self.left,
            1 => self.right,
            _ => 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AudioBuffer {
    data: Vec<f32>,
    frames: usize,
    channels: usize,
}

impl AudioBuffer {
    /// Creates a silent buffer.
    pub fn new(frames: usize, channels: usize) -> Self {
        Self {
            data: vec![0.0; frames * channels],
            frames,
            channels,
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn get(&self, frame: usize, ch: usize) -> f32 {
        self.data[frame * self.channels + ch]
    }

    #[inline]
    pub fn set(&mut self, frame: usize, ch: usize, value: f32) {
        self.data[frame * self.channels + ch] = value;
    }

    #[inline]
    pub fn add(&mut self, frame: usize, ch: usize, value: f32) {
        self.data[frame * self.channels + ch] += value;
    }

    /// Sums the first `frames` frames of `other` into this buffer with gain and pan.
    ///
    /// A mono source is spread over every destination channel.
    pub fn sum(&mut self, other: &AudioBuffer, frames: usize, gain: f32, pan: Pan) {
        let frames = frames.min(self.frames).min(other.frames);
        for frame in 0..frames {
            for ch in 0..self.channels {
                let src_ch = ch.min(other.channels.saturating_sub(1));
                let value = other.get(frame, src_ch) * gain * pan.gain(ch);
                self.add(frame, ch, value);
            }
        }
    }

    /// Copies the first `frames` frames of `other` scaled by `gain`, replacing content.
    pub fn set_from(&mut self, other: &AudioBuffer, frames: usize, gain: f32) {
        let frames = frames.min(self.frames).min(other.frames);
        for frame in 0..frames {
            for ch in 0..self.channels {
                let src_ch = ch.min(other.channels.saturating_sub(1));
                self.set(frame, ch, other.get(frame, src_ch) * gain);
            }
        }
    }

    /// Loads device input (interleaved, `src_channels` wide) scaled by `gain`.
    pub fn read_interleaved(&mut self, src: &[f32], src_channels: usize, frames: usize, gain: f32) {
        if src_channels == 0 {
            self.clear();
            return;
        }
        let frames = frames.min(self.frames).min(src.len() / src_channels);
        for frame in 0..frames {
            for ch in 0..self.channels {
                let src_ch = ch.min(src_channels - 1);
                self.set(frame, ch, src[frame * src_channels + src_ch] * gain);
            }
        }
        for frame in frames..self.frames {
            for ch in 0..self.channels {
                self.set(frame, ch, 0.0);
            }
        }
    }

    /// Writes into a device output block `dst_channels` wide.
    pub fn write_interleaved(&self, dst: &mut [f32], dst_channels: usize, frames: usize) {
        if dst_channels == 0 {
            return;
        }
        let frames = frames.min(self.frames).min(dst.len() / dst_channels);
        for frame in 0..frames {
            for ch in 0..dst_channels {
                let value = if ch < self.channels { self.get(frame, ch) } else { 0.0 };
                dst[frame * dst_channels + ch] = value;
            }
        }
    }

    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.data {
            *s *= gain;
        }
    }

    /// Absolute peak over the first `frames` frames.
    pub fn peak(&self, frames: usize) -> f32 {
        let len = (frames.min(self.frames)) * self.channels;
        self.data[..len].iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Hard-clips every sample to `[-1, 1]`.
    pub fn limit(&mut self) {
        for s in &mut self.data {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}
