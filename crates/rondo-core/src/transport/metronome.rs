//! Beat clicks mixed into the output.

use super::sequencer::{EventBuffer, SequencerEventKind};
use crate::AudioBuffer;

const CLICK_SECONDS: f64 = 0.03;

/// Precomputed click player. Owned by the renderer; `render` never allocates.
#[derive(Debug, Clone)]
pub struct Metronome {
    click_normal: Vec<f32>,
    click_accent: Vec<f32>,
    volume: f32,
    /// (accented, read position) of the click being played.
    playing: Option<(bool, usize)>,
}

impl Metronome {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = f64::from(sample_rate);
        Self {
            click_normal: Self::generate_click(sample_rate, false),
            click_accent: Self::generate_click(sample_rate, true),
            volume: 0.5,
            playing: None,
        }
    }

    fn generate_click(sample_rate: f64, is_accent: bool) -> Vec<f32> {
        let num_samples = (sample_rate * CLICK_SECONDS) as usize;

        let freq = if is_accent { 1200.0 } else { 1000.0 };
        let accent_volume = if is_accent { 1.0 } else { 0.7 };

        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate;
                let env = if t < 0.001 {
                    t / 0.001
                } else if t < 0.02 {
                    1.0
                } else {
                    1.0 - (t - 0.02) / 0.01
                };
                let phase = 2.0 * std::f64::consts::PI * freq * t;
                (phase.sin() * env * accent_volume) as f32
            })
            .collect()
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn reset(&mut self) {
        self.playing = None;
    }

    #[inline]
    pub fn click(&self, accent: bool) -> &[f32] {
        if accent {
            &self.click_accent
        } else {
            &self.click_normal
        }
    }

    /// Adds a click at every `Beat` event, accented on beat 0, and carries a
    /// click that started in an earlier buffer.
    pub fn render(&mut self, out: &mut AudioBuffer, frames: usize, events: &EventBuffer) {
        let mut beats = events.iter().filter_map(|e| match e.kind {
            SequencerEventKind::Beat(n) => Some((e.delta as usize, n == 0)),
            _ => None,
        });
        let mut next = beats.next();

        for frame in 0..frames.min(out.frames()) {
            if let Some((at, accent)) = next {
                if at == frame {
                    self.playing = Some((accent, 0));
                    next = beats.next();
                }
            }
            let Some((accent, pos)) = self.playing else {
                continue;
            };
            let click = if accent {
                &self.click_accent
            } else {
                &self.click_normal
            };
            match click.get(pos) {
                Some(&sample) => {
                    let sample = sample * self.volume;
                    for ch in 0..out.channels() {
                        out.add(frame, ch, sample);
                    }
                    self.playing = Some((accent, pos + 1));
                }
                None => self.playing = None,
            }
        }
    }
}
