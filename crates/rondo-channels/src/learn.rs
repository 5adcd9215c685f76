//! MIDI learn: inbound messages bound to channel and transport commands.
//!
//! A binding stores the packed message with its velocity byte masked, as
//! [`MidiEvent::raw_no_velocity`] returns it. For note and CC bindings the
//! velocity byte then carries the value (volume, pitch).

use rondo_core::config::{MAX_BPM, MIN_BPM};
use rondo_core::{ChannelId, Event, EventKind};
use rondo_midi::MidiEvent;
use serde::{Deserialize, Serialize};

use crate::channel::{MASTER_IN_ID, MASTER_OUT_ID};
use crate::sample::MAX_PITCH;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBindings {
    pub enabled: bool,
    /// `None` accepts every MIDI channel.
    pub filter: Option<u8>,
    pub key_press: Option<u32>,
    pub key_release: Option<u32>,
    pub kill: Option<u32>,
    pub arm: Option<u32>,
    pub mute: Option<u32>,
    pub solo: Option<u32>,
    pub volume: Option<u32>,
    pub pitch: Option<u32>,
    pub read_actions: Option<u32>,
}

impl ChannelBindings {
    /// The channel event `midi` is bound to, if any.
    pub fn translate(&self, id: ChannelId, midi: MidiEvent) -> Option<Event> {
        if !self.enabled || self.filter.is_some_and(|ch| ch != midi.channel()) {
            return None;
        }
        let pure = Some(midi.raw_no_velocity());
        let kind = if pure == self.key_press {
            EventKind::KeyPress {
                velocity: midi.velocity(),
            }
        } else if pure == self.key_release {
            EventKind::KeyRelease
        } else if pure == self.mute {
            EventKind::ChannelMute
        } else if pure == self.kill {
            EventKind::KeyKill
        } else if pure == self.arm {
            EventKind::ChannelToggleArm
        } else if pure == self.solo {
            EventKind::ChannelSolo
        } else if pure == self.volume {
            EventKind::ChannelVolume(midi.velocity_f32())
        } else if pure == self.pitch {
            EventKind::ChannelPitch(midi.velocity_f32() * MAX_PITCH)
        } else if pure == self.read_actions {
            EventKind::ChannelToggleReadActions
        } else {
            return None;
        };
        Some(Event::for_channel(id, kind))
    }
}

/// What toggling master bindings need to know about the engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportView {
    pub running: bool,
    pub recording_actions: bool,
    pub recording_input: bool,
    pub metronome: bool,
    pub bpm: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterBindings {
    pub rewind: Option<u32>,
    pub start_stop: Option<u32>,
    pub action_rec: Option<u32>,
    pub input_rec: Option<u32>,
    pub metronome: Option<u32>,
    pub volume_in: Option<u32>,
    pub volume_out: Option<u32>,
    pub beat_double: Option<u32>,
    pub beat_half: Option<u32>,
}

impl MasterBindings {
    pub fn translate(&self, midi: MidiEvent, view: &TransportView) -> Option<Event> {
        let pure = Some(midi.raw_no_velocity());
        let event = if pure == self.rewind {
            Event::new(EventKind::SequencerRewind)
        } else if pure == self.start_stop {
            Event::new(if view.running {
                EventKind::SequencerStop
            } else {
                EventKind::SequencerStart
            })
        } else if pure == self.action_rec {
            Event::new(if view.recording_actions {
                EventKind::ActionRecStop
            } else {
                EventKind::ActionRecStart
            })
        } else if pure == self.input_rec {
            Event::new(if view.recording_input {
                EventKind::InputRecStop
            } else {
                EventKind::InputRecStart { signal: false }
            })
        } else if pure == self.metronome {
            Event::new(EventKind::SequencerMetronome(!view.metronome))
        } else if pure == self.volume_in {
            Event::for_channel(MASTER_IN_ID, EventKind::ChannelVolume(midi.velocity_f32()))
        } else if pure == self.volume_out {
            Event::for_channel(MASTER_OUT_ID, EventKind::ChannelVolume(midi.velocity_f32()))
        } else if pure == self.beat_double {
            Event::new(EventKind::SequencerBpm((view.bpm * 2.0).min(MAX_BPM)))
        } else if pure == self.beat_half {
            Event::new(EventKind::SequencerBpm((view.bpm / 2.0).max(MIN_BPM)))
        } else {
            return None;
        };
        Some(event)
    }
}
