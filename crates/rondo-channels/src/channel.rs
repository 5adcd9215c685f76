//! A channel: identity, mixer parameters and a typed body.

use std::sync::Arc;

use rondo_core::{
    ActionRecorder, AudioBuffer, ChannelId, EngineConfig, Event, EventBuffer, EventKind, Pan,
    SequencerEvent, Sequencer,
};
use rondo_midi::MidiSink;
use serde::{Deserialize, Serialize};

use crate::learn::ChannelBindings;
use crate::midi::MidiChannel;
use crate::sample::SampleChannel;
use crate::shared::ChannelShared;
use crate::status::ChannelStatus;

pub const MASTER_OUT_ID: ChannelId = 1;
pub const MASTER_IN_ID: ChannelId = 2;
pub const PREVIEW_ID: ChannelId = 3;
/// First id handed out to user channels.
pub const FIRST_USER_ID: ChannelId = 4;

pub const MAX_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Sample,
    Midi,
    MasterOut,
    MasterIn,
    Preview,
}

/// Dispatcher-side inputs to [`ChannelBehavior::react`].
pub struct ReactContext<'a> {
    pub sequencer: &'a Sequencer,
    pub actions: &'a mut ActionRecorder,
    pub recording_actions: bool,
    pub chans_stop_on_seq_halt: bool,
    pub treat_recs_as_loops: bool,
}

/// Audio-side inputs to [`ChannelBehavior::advance`].
pub struct AdvanceContext<'a> {
    pub actions: &'a ActionRecorder,
    pub sequencer_running: bool,
}

/// Audio-side inputs to [`ChannelBehavior::render`].
pub struct RenderContext<'a> {
    /// Device input after the MASTER_IN gain.
    pub input: &'a AudioBuffer,
    pub frames: usize,
    pub sequencer_running: bool,
}

/// The parts of a [`Channel`] its body may look at.
pub struct ChannelInfo<'a> {
    pub id: ChannelId,
    pub shared: &'a Arc<ChannelShared>,
    pub muted: bool,
    pub armed: bool,
}

/// What every channel body can do.
pub trait ChannelBehavior {
    /// A user or transport event. Dispatcher thread.
    fn react(&mut self, info: &ChannelInfo<'_>, event: &Event, ctx: &mut ReactContext<'_>);

    /// A sequencer event of the current buffer. Audio thread.
    fn advance(&self, info: &ChannelInfo<'_>, event: &SequencerEvent, ctx: &AdvanceContext<'_>);

    /// Renders into the channel's scratch buffer. Audio thread.
    fn render(&self, info: &ChannelInfo<'_>, out: &mut AudioBuffer, ctx: &RenderContext<'_>);
}

/// MASTER_OUT and MASTER_IN: a volume and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasterChannel;

impl ChannelBehavior for MasterChannel {
    fn react(&mut self, _: &ChannelInfo<'_>, _: &Event, _: &mut ReactContext<'_>) {}

    fn advance(&self, _: &ChannelInfo<'_>, _: &SequencerEvent, _: &AdvanceContext<'_>) {}

    fn render(&self, _: &ChannelInfo<'_>, _: &mut AudioBuffer, _: &RenderContext<'_>) {}
}

#[derive(Debug, Clone)]
pub enum ChannelBody {
    Sample(SampleChannel),
    Midi(MidiChannel),
    Master(MasterChannel),
}

impl ChannelBehavior for ChannelBody {
    fn react(&mut self, info: &ChannelInfo<'_>, event: &Event, ctx: &mut ReactContext<'_>) {
        match self {
            ChannelBody::Sample(body) => body.react(info, event, ctx),
            ChannelBody::Midi(body) => body.react(info, event, ctx),
            ChannelBody::Master(body) => body.react(info, event, ctx),
        }
    }

    fn advance(&self, info: &ChannelInfo<'_>, event: &SequencerEvent, ctx: &AdvanceContext<'_>) {
        match self {
            ChannelBody::Sample(body) => body.advance(info, event, ctx),
            ChannelBody::Midi(body) => body.advance(info, event, ctx),
            ChannelBody::Master(body) => body.advance(info, event, ctx),
        }
    }

    fn render(&self, info: &ChannelInfo<'_>, out: &mut AudioBuffer, ctx: &RenderContext<'_>) {
        match self {
            ChannelBody::Sample(body) => body.render(info, out, ctx),
            ChannelBody::Midi(body) => body.render(info, out, ctx),
            ChannelBody::Master(body) => body.render(info, out, ctx),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    kind: ChannelKind,
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    mute: bool,
    solo: bool,
    pub armed: bool,
    pub bindings: ChannelBindings,
    pub shared: Arc<ChannelShared>,
    pub body: ChannelBody,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        kind: ChannelKind,
        config: &EngineConfig,
        sink: Arc<dyn MidiSink>,
    ) -> Self {
        let body = match kind {
            ChannelKind::Sample => ChannelBody::Sample(SampleChannel::new(config)),
            ChannelKind::Preview => ChannelBody::Sample(SampleChannel::preview(config)),
            ChannelKind::Midi => ChannelBody::Midi(MidiChannel::new(sink)),
            ChannelKind::MasterOut | ChannelKind::MasterIn => ChannelBody::Master(MasterChannel),
        };
        Self {
            id,
            kind,
            name: String::new(),
            volume: MAX_VOLUME,
            pan: 0.5,
            mute: false,
            solo: false,
            armed: false,
            bindings: ChannelBindings::default(),
            shared: Arc::new(ChannelShared::new()),
            body,
        }
    }

    #[inline]
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn sample(&self) -> Option<&SampleChannel> {
        match &self.body {
            ChannelBody::Sample(s) => Some(s),
            _ => None,
        }
    }

    pub fn sample_mut(&mut self) -> Option<&mut SampleChannel> {
        match &mut self.body {
            ChannelBody::Sample(s) => Some(s),
            _ => None,
        }
    }

    pub fn midi(&self) -> Option<&MidiChannel> {
        match &self.body {
            ChannelBody::Midi(m) => Some(m),
            _ => None,
        }
    }

    pub fn midi_mut(&mut self) -> Option<&mut MidiChannel> {
        match &mut self.body {
            ChannelBody::Midi(m) => Some(m),
            _ => None,
        }
    }

    // --- queries ---

    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            ChannelKind::MasterOut | ChannelKind::MasterIn | ChannelKind::Preview
        )
    }

    /// Internal channels are never muted.
    #[inline]
    pub fn is_muted(&self) -> bool {
        !self.is_internal() && self.mute
    }

    #[inline]
    pub fn is_soloed(&self) -> bool {
        self.solo
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    #[inline]
    pub fn status(&self) -> ChannelStatus {
        self.shared.status()
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    #[inline]
    pub fn is_reading_actions(&self) -> bool {
        self.shared.is_reading_actions()
    }

    pub fn has_wave(&self) -> bool {
        self.sample().is_some_and(SampleChannel::has_wave)
    }

    /// Armed sample channel that may receive recorded input.
    pub fn can_input_rec(&self) -> bool {
        if self.kind != ChannelKind::Sample {
            return false;
        }
        let protected = self.sample().is_some_and(|s| s.overdub_protection);
        self.armed && (!self.has_wave() || !protected)
    }

    pub fn can_action_rec(&self) -> bool {
        self.sample().is_some_and(SampleChannel::can_action_rec)
    }

    /// Whether the mixer should hear this channel.
    pub fn is_audible(&self, any_soloed: bool) -> bool {
        if self.is_internal() {
            return true;
        }
        if self.is_muted() {
            return false;
        }
        !any_soloed || self.solo
    }

    /// Volume times the velocity multiplier.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.volume * self.shared.volume_i.get()
    }

    #[inline]
    pub fn pan_law(&self) -> Pan {
        Pan::linear(self.pan)
    }

    fn info(&self) -> ChannelInfo<'_> {
        ChannelInfo {
            id: self.id,
            shared: &self.shared,
            muted: self.is_muted(),
            armed: self.armed,
        }
    }

    // --- behaviour ---

    /// Applies `event` if it addresses this channel. Dispatcher thread.
    pub fn react(&mut self, event: &Event, ctx: &mut ReactContext<'_>) {
        if !event.addresses(self.id) {
            return;
        }
        match event.kind {
            EventKind::ChannelVolume(volume) => self.volume = volume.clamp(0.0, MAX_VOLUME),
            EventKind::ChannelPan(pan) => self.pan = pan.clamp(0.0, 1.0),
            EventKind::ChannelMute => self.mute = !self.mute,
            EventKind::ChannelSolo => self.solo = !self.solo,
            EventKind::ChannelToggleArm if self.kind == ChannelKind::Sample => {
                self.armed = !self.armed
            }
            _ => {}
        }
        let info = ChannelInfo {
            id: self.id,
            shared: &self.shared,
            muted: self.is_muted(),
            armed: self.armed,
        };
        self.body.react(&info, event, ctx);
    }

    /// Feeds this buffer's sequencer events. Audio thread.
    pub fn advance(&self, events: &EventBuffer, ctx: &AdvanceContext<'_>) {
        let info = self.info();
        for event in events {
            self.body.advance(&info, event, ctx);
        }
    }

    /// Renders into `out`, which the caller cleared. Audio thread.
    pub fn render(&self, out: &mut AudioBuffer, ctx: &RenderContext<'_>) {
        self.body.render(&self.info(), out, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rondo_midi::NullSink;

    fn channel(id: ChannelId, kind: ChannelKind) -> Channel {
        Channel::new(id, kind, &EngineConfig::default(), Arc::new(NullSink))
    }

    fn send(ch: &mut Channel, kind: EventKind) {
        let seq = Sequencer::new(&EngineConfig::default());
        let mut actions = ActionRecorder::new();
        let mut ctx = ReactContext {
            sequencer: &seq,
            actions: &mut actions,
            recording_actions: false,
            chans_stop_on_seq_halt: false,
            treat_recs_as_loops: false,
        };
        ch.react(&Event::for_channel(ch.id, kind), &mut ctx);
    }

    #[test]
    fn test_internal_channels_cannot_be_muted() {
        let mut out = channel(MASTER_OUT_ID, ChannelKind::MasterOut);
        send(&mut out, EventKind::ChannelMute);
        assert!(!out.is_muted());
        assert!(out.is_audible(true));

        let mut preview = channel(PREVIEW_ID, ChannelKind::Preview);
        send(&mut preview, EventKind::ChannelMute);
        assert!(preview.is_internal());
        assert!(!preview.is_muted());
    }

    #[test]
    fn test_mixer_parameters() {
        let mut ch = channel(FIRST_USER_ID, ChannelKind::Sample);
        send(&mut ch, EventKind::ChannelVolume(2.0));
        assert_eq!(ch.volume, MAX_VOLUME);
        send(&mut ch, EventKind::ChannelPan(0.25));
        assert_eq!(ch.pan_law(), Pan { left: 0.75, right: 0.25 });
        send(&mut ch, EventKind::ChannelMute);
        assert!(ch.is_muted());
        assert!(!ch.is_audible(false));
        send(&mut ch, EventKind::ChannelPitch(2.0));
        assert_eq!(ch.sample().unwrap().pitch(), 2.0);
    }

    #[test]
    fn test_solo_decides_audibility() {
        let mut soloed = channel(4, ChannelKind::Sample);
        let other = channel(5, ChannelKind::Sample);
        send(&mut soloed, EventKind::ChannelSolo);
        assert!(soloed.is_audible(true));
        assert!(!other.is_audible(true));
        assert!(other.is_audible(false));
    }

    #[test]
    fn test_events_for_other_channels_are_ignored() {
        let mut ch = channel(4, ChannelKind::Sample);
        let seq = Sequencer::new(&EngineConfig::default());
        let mut actions = ActionRecorder::new();
        let mut ctx = ReactContext {
            sequencer: &seq,
            actions: &mut actions,
            recording_actions: false,
            chans_stop_on_seq_halt: false,
            treat_recs_as_loops: false,
        };
        ch.react(&Event::for_channel(5, EventKind::ChannelMute), &mut ctx);
        assert!(!ch.is_muted());
    }

    #[test]
    fn test_arm_and_input_rec() {
        let mut ch = channel(4, ChannelKind::Sample);
        assert!(!ch.can_input_rec());
        send(&mut ch, EventKind::ChannelToggleArm);
        assert!(ch.can_input_rec());

        ch.sample_mut().unwrap().overdub_protection = true;
        ch.sample_mut()
            .unwrap()
            .set_wave(Some(crate::sample::testing::ramp(10)));
        assert!(!ch.can_input_rec());

        let mut midi = channel(5, ChannelKind::Midi);
        send(&mut midi, EventKind::ChannelToggleArm);
        assert!(!midi.armed);
        assert!(!midi.can_input_rec());
    }
}
