//! MIDI beat clock: 24 pulses per quarter note.
//!
//! [`ClockFollower`] turns an incoming clock stream into tempo and transport
//! signals (slave mode). [`ClockGenerator`] counts the pulses a master has to
//! emit for a block of audio.

use serde::{Deserialize, Serialize};

/// Pulses per quarter note.
pub const PPQN: u32 = 24;

/// Tempo changes smaller than this are not reported.
const BPM_TOLERANCE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockMessage {
    Tick,
    Start,
    Continue,
    Stop,
    /// Song position in MIDI beats (sixteenth notes).
    SongPosition(u16),
}

impl ClockMessage {
    pub fn to_bytes(&self) -> ([u8; 3], usize) {
        match self {
            ClockMessage::Tick => ([0xF8, 0, 0], 1),
            ClockMessage::Start => ([0xFA, 0, 0], 1),
            ClockMessage::Continue => ([0xFB, 0, 0], 1),
            ClockMessage::Stop => ([0xFC, 0, 0], 1),
            ClockMessage::SongPosition(pos) => {
                ([0xF2, (*pos & 0x7F) as u8, ((*pos >> 7) & 0x7F) as u8], 3)
            }
        }
    }
}

/// What a followed clock asks the transport to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockSignal {
    Start,
    Stop,
    Bpm(f32),
    /// Beat within the loop.
    Position(u32),
}

/// Derives tempo and transport changes from an external clock.
#[derive(Debug, Default)]
pub struct ClockFollower {
    pulses: u32,
    quarter_started_at: Option<f64>,
    last_bpm: f32,
}

impl ClockFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one message received at `timestamp` seconds.
    pub fn receive(
        &mut self,
        msg: ClockMessage,
        timestamp: f64,
        beats_in_loop: u32,
    ) -> Option<ClockSignal> {
        match msg {
            ClockMessage::Tick => self.on_tick(timestamp),
            ClockMessage::Start => {
                self.pulses = 0;
                self.quarter_started_at = Some(timestamp);
                Some(ClockSignal::Start)
            }
            ClockMessage::Continue => Some(ClockSignal::Start),
            ClockMessage::Stop => Some(ClockSignal::Stop),
            ClockMessage::SongPosition(sixteenths) => {
                let beat = (sixteenths as u32 / 4) % beats_in_loop.max(1);
                Some(ClockSignal::Position(beat))
            }
        }
    }

    pub fn bpm(&self) -> f32 {
        self.last_bpm
    }

    fn on_tick(&mut self, timestamp: f64) -> Option<ClockSignal> {
        let Some(started) = self.quarter_started_at else {
            self.quarter_started_at = Some(timestamp);
            self.pulses = 0;
            return None;
        };

        self.pulses += 1;
        if self.pulses < PPQN {
            return None;
        }

        let quarter = timestamp - started;
        self.pulses = 0;
        self.quarter_started_at = Some(timestamp);
        if quarter <= 0.0 {
            return None;
        }

        let bpm = ((60.0 / quarter) * 100.0).round() as f32 / 100.0;
        if (bpm - self.last_bpm).abs() < BPM_TOLERANCE {
            return None;
        }
        self.last_bpm = bpm;
        Some(ClockSignal::Bpm(bpm))
    }
}

/// Counts clock pulses for a master clock driven by audio blocks.
#[derive(Debug, Default)]
pub struct ClockGenerator {
    /// Frames elapsed since the last pulse, as a fraction of a pulse.
    phase: f64,
}

impl ClockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Number of pulses that fall inside the next `frames` frames.
    pub fn advance(&mut self, frames: usize, sample_rate: u32, bpm: f32) -> u32 {
        if sample_rate == 0 || bpm <= 0.0 {
            return 0;
        }
        let frames_per_pulse = sample_rate as f64 * 60.0 / (bpm as f64 * PPQN as f64);
        self.phase += frames as f64 / frames_per_pulse;
        let pulses = self.phase.floor();
        self.phase -= pulses;
        pulses as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_follower_computes_bpm_from_a_quarter() {
        let mut follower = ClockFollower::new();
        assert_eq!(follower.receive(ClockMessage::Start, 0.0, 4), Some(ClockSignal::Start));

        // 120 bpm: one quarter every 0.5 s, one pulse every 0.5/24 s.
        let pulse = 0.5 / PPQN as f64;
        let mut last = None;
        for i in 1..=PPQN {
            last = follower.receive(ClockMessage::Tick, pulse * i as f64, 4);
        }
        match last {
            Some(ClockSignal::Bpm(bpm)) => assert_relative_eq!(bpm, 120.0, epsilon = 0.01),
            other => panic!("expected bpm signal, got {other:?}"),
        }

        // Same tempo again: no new signal.
        let mut repeated = None;
        for i in 1..=PPQN {
            repeated = follower.receive(ClockMessage::Tick, 0.5 + pulse * i as f64, 4);
        }
        assert_eq!(repeated, None);
    }

    #[test]
    fn test_song_position_wraps_on_loop() {
        let mut follower = ClockFollower::new();
        // 20 sixteenths = 5 beats, loop of 4 beats -> beat 1.
        assert_eq!(
            follower.receive(ClockMessage::SongPosition(20), 0.0, 4),
            Some(ClockSignal::Position(1))
        );
    }

    #[test]
    fn test_generator_pulse_count() {
        let mut clock = ClockGenerator::new();
        // 120 bpm at 48k: 1000 frames per pulse.
        assert_eq!(clock.advance(2500, 48_000, 120.0), 2);
        assert_eq!(clock.advance(500, 48_000, 120.0), 1);
        assert_eq!(clock.advance(999, 48_000, 120.0), 0);
    }

    #[test]
    fn test_song_position_bytes() {
        assert_eq!(ClockMessage::SongPosition(130).to_bytes(), ([0xF2, 2, 1], 3));
    }
}
