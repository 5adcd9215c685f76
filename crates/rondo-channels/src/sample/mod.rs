//! Sample channels: a wave, a play head and the behaviours driving it.
//!
//! - [`player`]: renders the wave, applies render commands, handles the end
//!   of the sample
//! - [`advancer`]: reacts to sequencer boundaries on the audio thread
//! - [`reactor`]: reacts to user events on the dispatcher thread
//! - [`recorder`]: records and replays performance actions

pub(crate) mod advancer;
pub(crate) mod player;
pub(crate) mod reactor;
pub(crate) mod recorder;
mod wave;

use std::sync::Arc;

use rondo_core::{AudioBuffer, EngineConfig, Event, EventKind, Frame, Pan, SequencerEvent};
use serde::{Deserialize, Serialize};

use crate::channel::{AdvanceContext, ChannelBehavior, ChannelInfo, ReactContext, RenderContext};
use crate::{Error, Result};

pub use reactor::{schedule, unschedule, PLAY_SLOT, REWIND_SLOT};
pub use wave::Wave;

pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SamplePlayerMode {
    #[default]
    LoopBasic,
    /// Plays one loop round, then waits for the next first beat.
    LoopOnce,
    /// Restarts on every bar.
    LoopRepeat,
    /// Plays one round starting on a bar.
    LoopOnceBar,
    SingleBasic,
    /// Plays while the key is held.
    SinglePress,
    /// A press while playing restarts the sample.
    SingleRetrig,
    /// Loops until pressed again.
    SingleEndless,
}

impl SamplePlayerMode {
    #[inline]
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            Self::LoopBasic | Self::LoopOnce | Self::LoopRepeat | Self::LoopOnceBar
        )
    }

    #[inline]
    pub fn is_single(self) -> bool {
        !self.is_loop()
    }
}

#[derive(Debug, Clone)]
pub struct SampleChannel {
    pub mode: SamplePlayerMode,
    wave: Option<Arc<Wave>>,
    begin: Frame,
    end: Frame,
    pitch: f32,
    pub velocity_as_vol: bool,
    pub input_monitor: bool,
    pub overdub_protection: bool,
    /// Preview channels have no action recording.
    recorders: bool,
}

impl SampleChannel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: SamplePlayerMode::default(),
            wave: None,
            begin: 0,
            end: 0,
            pitch: 1.0,
            velocity_as_vol: false,
            input_monitor: config.input_monitor_default_on,
            overdub_protection: config.overdub_protection_default_on,
            recorders: true,
        }
    }

    pub fn preview(config: &EngineConfig) -> Self {
        Self {
            mode: SamplePlayerMode::SingleBasic,
            recorders: false,
            ..Self::new(config)
        }
    }

    pub fn wave(&self) -> Option<&Arc<Wave>> {
        self.wave.as_ref()
    }

    #[inline]
    pub fn has_wave(&self) -> bool {
        self.wave.is_some()
    }

    /// Replaces the wave and resets the trim to its full length.
    pub fn set_wave(&mut self, wave: Option<Arc<Wave>>) {
        self.end = wave.as_ref().map_or(0, |w| w.len());
        self.begin = 0;
        self.wave = wave;
    }

    pub fn begin(&self) -> Frame {
        self.begin
    }

    pub fn end(&self) -> Frame {
        self.end
    }

    /// Restricts playback to `begin..end`.
    pub fn set_trim(&mut self, begin: Frame, end: Frame) -> Result<()> {
        let len = self.wave.as_ref().map_or(0, |w| w.len());
        if begin >= end || end > len {
            return Err(Error::InvalidTrim { begin, end, len });
        }
        self.begin = begin;
        self.end = end;
        Ok(())
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }

    pub fn has_recorders(&self) -> bool {
        self.recorders
    }

    /// Recorded actions make sense only for one-shot samples.
    pub fn can_action_rec(&self) -> bool {
        self.recorders && self.has_wave() && !self.mode.is_loop()
    }
}

impl ChannelBehavior for SampleChannel {
    fn react(&mut self, info: &ChannelInfo<'_>, event: &Event, ctx: &mut ReactContext<'_>) {
        if let EventKind::ChannelPitch(pitch) = event.kind {
            self.set_pitch(pitch);
            return;
        }
        if self.recorders {
            recorder::react(self, info, event, ctx);
        }
        reactor::react(self, info, event, ctx);
    }

    fn advance(&self, info: &ChannelInfo<'_>, event: &SequencerEvent, ctx: &AdvanceContext<'_>) {
        advancer::advance(self, info, event, ctx);
    }

    fn render(&self, info: &ChannelInfo<'_>, out: &mut AudioBuffer, ctx: &RenderContext<'_>) {
        player::render(self, info.shared, out, ctx.frames, ctx.sequencer_running);
        if info.armed && self.input_monitor {
            out.sum(ctx.input, ctx.frames, 1.0, Pan::CENTER);
        }
    }
}
