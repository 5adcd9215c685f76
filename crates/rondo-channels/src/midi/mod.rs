//! MIDI channels: no audio, they replay recorded actions to a MIDI output.
//!
//! - [`controller`]: playback status driven by keys and the first beat
//! - [`sender`]: recorded actions and All Notes Off to the [`MidiSink`]
//! - [`recorder`]: records inbound notes as actions

pub(crate) mod controller;
pub(crate) mod recorder;
pub(crate) mod sender;

use std::fmt;
use std::sync::Arc;

use rondo_core::{AudioBuffer, Event, SequencerEvent};
use rondo_midi::{MidiEvent, MidiSink};

use crate::channel::{AdvanceContext, ChannelBehavior, ChannelInfo, ReactContext, RenderContext};

#[derive(Clone)]
pub struct MidiChannel {
    pub output_enabled: bool,
    /// Outbound events are re-channelled to this MIDI channel.
    pub output_channel: u8,
    pub input_enabled: bool,
    /// `None` accepts every MIDI channel.
    pub input_filter: Option<u8>,
    sink: Arc<dyn MidiSink>,
}

impl MidiChannel {
    pub fn new(sink: Arc<dyn MidiSink>) -> Self {
        Self {
            output_enabled: false,
            output_channel: 0,
            input_enabled: false,
            input_filter: None,
            sink,
        }
    }

    pub fn sink(&self) -> &Arc<dyn MidiSink> {
        &self.sink
    }

    /// Whether inbound `event` passes the input filter.
    pub fn accepts(&self, event: MidiEvent) -> bool {
        self.input_enabled && self.input_filter.map_or(true, |ch| ch == event.channel())
    }
}

impl fmt::Debug for MidiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiChannel")
            .field("output_enabled", &self.output_enabled)
            .field("output_channel", &self.output_channel)
            .field("input_enabled", &self.input_enabled)
            .field("input_filter", &self.input_filter)
            .finish_non_exhaustive()
    }
}

impl ChannelBehavior for MidiChannel {
    fn react(&mut self, info: &ChannelInfo<'_>, event: &Event, ctx: &mut ReactContext<'_>) {
        controller::react(info.shared, event);
        sender::react(self, event);
        recorder::react(self, info, event, ctx);
    }

    fn advance(&self, info: &ChannelInfo<'_>, event: &SequencerEvent, ctx: &AdvanceContext<'_>) {
        controller::advance(info.shared, event);
        sender::advance(self, info, event, ctx);
    }

    fn render(&self, _info: &ChannelInfo<'_>, _out: &mut AudioBuffer, _ctx: &RenderContext<'_>) {}
}
