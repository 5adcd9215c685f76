//! Immutable sample data shared between generations.

use rondo_core::{AudioBuffer, Frame};

use crate::{Error, Result};

/// Mono or stereo audio loaded into memory.
#[derive(Debug, Clone)]
pub struct Wave {
    data: AudioBuffer,
    sample_rate: u32,
    name: String,
}

impl Wave {
    pub fn new(data: AudioBuffer, sample_rate: u32) -> Result<Self> {
        if data.frames() == 0 {
            return Err(Error::InvalidWave("no frames".into()));
        }
        if !(1..=2).contains(&data.channels()) {
            return Err(Error::InvalidWave(format!(
                "{} channels, expected mono or stereo",
                data.channels()
            )));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidWave("sample rate is zero".into()));
        }
        Ok(Self {
            data,
            sample_rate,
            name: String::new(),
        })
    }

    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidWave("zero channels".into()));
        }
        let frames = samples.len() / channels;
        let mut data = AudioBuffer::new(frames, channels);
        data.read_interleaved(samples, channels, frames, 1.0);
        Self::new(data, sample_rate)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in frames.
    #[inline]
    pub fn len(&self) -> Frame {
        self.data.frames() as Frame
    }

    pub fn is_empty(&self) -> bool {
        self.data.frames() == 0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.data.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / f64::from(self.sample_rate)
    }

    pub fn data(&self) -> &AudioBuffer {
        &self.data
    }

    /// Sample at an integer frame. A mono wave answers on every channel.
    #[inline]
    pub fn at(&self, frame: usize, ch: usize) -> f32 {
        self.data.get(frame, ch.min(self.data.channels() - 1))
    }

    /// Stereo frame at a fractional position, linearly interpolated.
    /// The neighbour never reaches past `end`.
    #[inline]
    pub fn frame_at(&self, position: f64, end: Frame) -> (f32, f32) {
        let last = (end.min(self.len()) as usize).saturating_sub(1);
        let idx = position.floor() as usize;
        if idx > last {
            return (0.0, 0.0);
        }
        let frac = position.fract() as f32;
        let next = (idx + 1).min(last);

        let (l0, r0) = (self.at(idx, 0), self.at(idx, 1));
        let (l1, r1) = (self.at(next, 0), self.at(next, 1));
        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }
}
