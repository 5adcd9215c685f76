//! Engine configuration.
//!
//! Plain values supplied by the host; the sequencer and mixer read them at
//! reset time. No on-disk format is defined here, but the struct is serde
//! friendly so a host can keep it in whatever format it likes.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MIN_BPM: f32 = 20.0;
pub const MAX_BPM: f32 = 999.0;
pub const MAX_BEATS: u32 = 32;
pub const MAX_BARS: u32 = 32;
pub const MAX_BUFFER_SIZE: usize = 8192;

/// How long an input recording may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputRecMode {
    /// Exactly one loop.
    #[default]
    Rigid,
    /// Up to the longest possible loop.
    Free,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub output_channels: usize,
    pub input_channels: usize,

    pub bpm: f32,
    pub beats: u32,
    pub bars: u32,
    /// Grid subdivisions per beat. 0 disables quantization.
    pub quantize: u32,
    /// Beats of count-in before the transport runs. 0 starts immediately.
    pub count_in_beats: u32,

    /// Stop loops and action-driven channels when the sequencer halts.
    pub chans_stop_on_seq_halt: bool,
    /// Toggling recorded actions waits for the next first beat.
    pub treat_recs_as_loops: bool,
    /// Input level (dBFS) that starts a signal-triggered recording.
    pub rec_trigger_level: f32,
    pub input_rec_mode: InputRecMode,
    pub input_monitor_default_on: bool,
    pub overdub_protection_default_on: bool,
    /// Hard-clip the final output.
    pub limit_output: bool,

    pub dispatcher_queue_capacity: usize,
    /// Events applied per publish.
    pub dispatcher_batch_size: usize,
    pub dispatcher_tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 512,
            output_channels: 2,
            input_channels: 2,
            bpm: 120.0,
            beats: 4,
            bars: 1,
            quantize: 1,
            count_in_beats: 0,
            chans_stop_on_seq_halt: false,
            treat_recs_as_loops: false,
            rec_trigger_level: -10.0,
            input_rec_mode: InputRecMode::Rigid,
            input_monitor_default_on: false,
            overdub_protection_default_on: false,
            limit_output: false,
            dispatcher_queue_capacity: 1024,
            dispatcher_batch_size: 32,
            dispatcher_tick_ms: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=384_000).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.buffer_size == 0 || self.buffer_size > MAX_BUFFER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "buffer_size {} out of range (1-{MAX_BUFFER_SIZE})",
                self.buffer_size
            )));
        }
        if !(1..=2).contains(&self.output_channels) || self.input_channels > 2 {
            return Err(Error::InvalidConfig(format!(
                "unsupported channel layout: {} in, {} out",
                self.input_channels, self.output_channels
            )));
        }
        validate_bpm(self.bpm)?;
        validate_beats(self.beats, self.bars)?;
        if self.dispatcher_queue_capacity == 0 || self.dispatcher_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "dispatcher queue and batch size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

pub fn validate_bpm(bpm: f32) -> Result<()> {
    if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
        return Err(Error::InvalidTempo(bpm));
    }
    Ok(())
}

pub fn validate_beats(beats: u32, bars: u32) -> Result<()> {
    if beats == 0 || beats > MAX_BEATS || bars == 0 || bars > MAX_BARS || bars > beats {
        return Err(Error::InvalidBeats { beats, bars });
    }
    Ok(())
}
