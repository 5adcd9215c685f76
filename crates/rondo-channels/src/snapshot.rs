//! Hydrate/dehydrate: the persistent shape of a channel.
//!
//! The engine does not define an on-disk format. A host serializes
//! [`ChannelSnapshot`]s with serde in whatever format it likes and hands the
//! decoded waves back on load.

use std::sync::Arc;

use rondo_core::{Action, ActionRecorder, ChannelId, EngineConfig, Frame};
use rondo_midi::MidiSink;
use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelBody, ChannelKind};
use crate::learn::ChannelBindings;
use crate::sample::{SamplePlayerMode, Wave};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSnapshot {
    pub mode: SamplePlayerMode,
    /// Name of the wave, for the host to resolve.
    pub wave: Option<String>,
    pub begin: Frame,
    pub end: Frame,
    pub pitch: f32,
    pub velocity_as_vol: bool,
    pub input_monitor: bool,
    pub overdub_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiSnapshot {
    pub output_enabled: bool,
    pub output_channel: u8,
    pub input_enabled: bool,
    pub input_filter: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub kind: ChannelKind,
    #[serde(default)]
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub armed: bool,
    #[serde(default)]
    pub read_actions: bool,
    #[serde(default)]
    pub bindings: ChannelBindings,
    #[serde(default)]
    pub sample: Option<SampleSnapshot>,
    #[serde(default)]
    pub midi: Option<MidiSnapshot>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Captures `channel` and its recorded actions.
pub fn dehydrate(channel: &Channel, actions: &ActionRecorder) -> ChannelSnapshot {
    let sample = channel.sample().map(|s| SampleSnapshot {
        mode: s.mode,
        wave: s.wave().map(|w| w.name().to_owned()),
        begin: s.begin(),
        end: s.end(),
        pitch: s.pitch(),
        velocity_as_vol: s.velocity_as_vol,
        input_monitor: s.input_monitor,
        overdub_protection: s.overdub_protection,
    });
    let midi = channel.midi().map(|m| MidiSnapshot {
        output_enabled: m.output_enabled,
        output_channel: m.output_channel,
        input_enabled: m.input_enabled,
        input_filter: m.input_filter,
    });
    ChannelSnapshot {
        id: channel.id,
        kind: channel.kind(),
        name: channel.name.clone(),
        volume: channel.volume,
        pan: channel.pan,
        mute: channel.is_muted(),
        solo: channel.is_soloed(),
        armed: channel.armed,
        read_actions: channel.is_reading_actions(),
        bindings: channel.bindings.clone(),
        sample,
        midi,
        actions: actions.actions_of(channel.id),
    }
}

/// Rebuilds a channel. Playback always restarts from OFF.
///
/// Recorded actions stay in the snapshot; the caller imports them into its
/// [`ActionRecorder`].
pub fn hydrate(
    snapshot: &ChannelSnapshot,
    config: &EngineConfig,
    sink: Arc<dyn MidiSink>,
    wave: Option<Arc<Wave>>,
) -> Result<Channel> {
    let mut channel = Channel::new(snapshot.id, snapshot.kind, config, sink);
    channel.name = snapshot.name.clone();
    channel.volume = snapshot.volume;
    channel.pan = snapshot.pan;
    channel.set_mute(snapshot.mute);
    channel.set_solo(snapshot.solo);
    channel.armed = snapshot.armed && snapshot.kind == ChannelKind::Sample;
    channel.bindings = snapshot.bindings.clone();

    let wrong_kind = || Error::WrongKind {
        id: snapshot.id,
        kind: snapshot.kind,
    };
    match (&mut channel.body, &snapshot.sample, &snapshot.midi) {
        (ChannelBody::Sample(body), Some(s), None) => {
            body.mode = s.mode;
            body.velocity_as_vol = s.velocity_as_vol;
            body.input_monitor = s.input_monitor;
            body.overdub_protection = s.overdub_protection;
            body.set_pitch(s.pitch);
            if wave.is_some() {
                body.set_wave(wave);
                body.set_trim(s.begin, s.end)?;
            }
        }
        (ChannelBody::Sample(_), None, None) => {}
        (ChannelBody::Midi(body), None, Some(m)) => {
            body.output_enabled = m.output_enabled;
            body.output_channel = m.output_channel;
            body.input_enabled = m.input_enabled;
            body.input_filter = m.input_filter;
        }
        (ChannelBody::Midi(_), None, None) | (ChannelBody::Master(_), None, None) => {}
        _ => return Err(wrong_kind()),
    }

    if snapshot.read_actions {
        channel.shared.start_reading_actions();
    }
    tracing::debug!(id = snapshot.id, kind = ?snapshot.kind, "channel hydrated");
    Ok(channel)
}
