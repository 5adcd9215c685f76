//! The engine state published to the audio thread.

use std::sync::Arc;

use rondo_channels::{
    sample, Channel, ChannelKind, MasterBindings, MixerParams, TransportView, FIRST_USER_ID,
    MASTER_IN_ID, MASTER_OUT_ID, PREVIEW_ID,
};
use rondo_core::{ActionRecorder, ChannelId, EngineConfig, Sequencer};
use rondo_midi::MidiSink;
use tracing::debug;

use crate::Result;

/// One generation of engine state: channels, transport and recorded actions.
///
/// Cloned on every publish. Channel status, play heads and the transport
/// position live behind `Arc`s, so a clone is cheap and every generation
/// sees the same realtime state.
#[derive(Debug, Clone)]
pub struct Layout {
    pub channels: Vec<Channel>,
    pub sequencer: Sequencer,
    pub actions: ActionRecorder,
    pub mixer: MixerParams,
    pub master_bindings: MasterBindings,
    pub recording_actions: bool,
    pub recording_input: bool,
    /// Channels ignore sequencer events while set.
    pub locked: bool,
    /// Highest channel id ever added. Ids are never handed out twice.
    last_channel_id: ChannelId,
}

impl Layout {
    /// A layout holding only the internal channels.
    pub fn new(config: &EngineConfig, sink: &Arc<dyn MidiSink>) -> Result<Self> {
        let mut layout = Self {
            channels: Vec::new(),
            sequencer: Sequencer::new(config),
            actions: ActionRecorder::new(),
            mixer: MixerParams::from_config(config),
            master_bindings: MasterBindings::default(),
            recording_actions: false,
            recording_input: false,
            locked: false,
            last_channel_id: 0,
        };
        for (id, kind) in [
            (MASTER_OUT_ID, ChannelKind::MasterOut),
            (MASTER_IN_ID, ChannelKind::MasterIn),
            (PREVIEW_ID, ChannelKind::Preview),
        ] {
            layout.add_channel(Channel::new(id, kind, config, Arc::clone(sink)))?;
        }
        Ok(layout)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|ch| ch.id == id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|ch| ch.id == id)
    }

    pub fn next_channel_id(&self) -> ChannelId {
        (self.last_channel_id + 1).max(FIRST_USER_ID)
    }

    /// Appends `channel` and registers its quantized actions.
    pub fn add_channel(&mut self, channel: Channel) -> Result<()> {
        if channel.sample().is_some() {
            sample::schedule(&mut self.sequencer.quantizer, channel.id, &channel.shared)?;
        }
        debug!(id = channel.id, kind = ?channel.kind(), "channel added");
        self.last_channel_id = self.last_channel_id.max(channel.id);
        self.channels.push(channel);
        Ok(())
    }

    /// Removes a channel together with its quantized and recorded actions.
    pub fn remove_channel(&mut self, id: ChannelId) -> Option<Channel> {
        let index = self.channels.iter().position(|ch| ch.id == id)?;
        let channel = self.channels.remove(index);
        sample::unschedule(&mut self.sequencer.quantizer, id);
        self.actions.clear_channel(id);
        debug!(id, "channel removed");
        Some(channel)
    }

    /// Drops every user channel and recorded action.
    pub fn clear_user_channels(&mut self) {
        let ids: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|ch| !ch.is_internal())
            .map(|ch| ch.id)
            .collect();
        for id in ids {
            self.remove_channel(id);
        }
        self.actions.clear_all();
    }

    pub fn transport_view(&self) -> TransportView {
        TransportView {
            running: self.sequencer.is_running(),
            recording_actions: self.recording_actions,
            recording_input: self.recording_input,
            metronome: self.sequencer.metronome(),
            bpm: self.sequencer.bpm(),
        }
    }
}
