//! Events carried from producer threads to the dispatcher.

use rondo_midi::MidiEvent;

use crate::{ChannelId, Frame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    KeyPress { velocity: u8 },
    KeyRelease,
    KeyKill,

    SequencerStart,
    SequencerStop,
    SequencerRewind,
    SequencerBpm(f32),
    SequencerGoToBeat(u32),
    SequencerBeats { beats: u32, bars: u32 },
    /// Grid subdivisions per beat; 0 disables quantization.
    SequencerQuantize(u32),
    SequencerMetronome(bool),

    /// Inbound channel MIDI from the driver.
    Midi(MidiEvent),

    /// Input crossed the trigger level while armed.
    MixerSignalThreshold,
    /// The input record buffer is full.
    MixerEndOfRecording,

    ActionRecStart,
    ActionRecStop,
    /// Start input recording, immediately or on the next signal.
    InputRecStart { signal: bool },
    InputRecStop,

    ChannelToggleReadActions,
    ChannelKillReadActions,
    ChannelToggleArm,
    ChannelMute,
    ChannelSolo,
    ChannelVolume(f32),
    ChannelPitch(f32),
    ChannelPan(f32),
}

/// Which extension point an event is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Sequencer,
    Channels,
    Both,
}

impl EventKind {
    pub fn target(&self) -> EventTarget {
        use EventKind::*;
        match self {
            SequencerStop | SequencerRewind => EventTarget::Both,
            SequencerStart
            | SequencerBpm(_)
            | SequencerGoToBeat(_)
            | SequencerBeats { .. }
            | SequencerQuantize(_)
            | SequencerMetronome(_)
            | MixerSignalThreshold
            | MixerEndOfRecording
            | ActionRecStart
            | ActionRecStop
            | InputRecStart { .. }
            | InputRecStop => EventTarget::Sequencer,
            Midi(_)
            | KeyPress { .. }
            | KeyRelease
            | KeyKill
            | ChannelToggleReadActions
            | ChannelKillReadActions
            | ChannelToggleArm
            | ChannelMute
            | ChannelSolo
            | ChannelVolume(_)
            | ChannelPitch(_)
            | ChannelPan(_) => EventTarget::Channels,
        }
    }
}

/// `channel_id` 0 addresses every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub delta: Frame,
    pub channel_id: ChannelId,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            delta: 0,
            channel_id: 0,
        }
    }

    pub fn for_channel(channel_id: ChannelId, kind: EventKind) -> Self {
        Self {
            kind,
            delta: 0,
            channel_id,
        }
    }

    pub fn with_delta(mut self, delta: Frame) -> Self {
        self.delta = delta;
        self
    }

    #[inline]
    pub fn target(&self) -> EventTarget {
        self.kind.target()
    }

    /// Whether a channel with `id` should react.
    #[inline]
    pub fn addresses(&self, id: ChannelId) -> bool {
        self.channel_id == 0 || self.channel_id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets() {
        assert_eq!(EventKind::SequencerStart.target(), EventTarget::Sequencer);
        assert_eq!(EventKind::SequencerStop.target(), EventTarget::Both);
        assert_eq!(EventKind::KeyPress { velocity: 1 }.target(), EventTarget::Channels);
        assert_eq!(
            EventKind::Midi(MidiEvent::note_on(0, 60, 100)).target(),
            EventTarget::Channels
        );
    }

    #[test]
    fn test_broadcast_addresses_everyone() {
        let broadcast = Event::new(EventKind::SequencerStop);
        assert!(broadcast.addresses(3));
        let targeted = Event::for_channel(2, EventKind::KeyKill).with_delta(5);
        assert!(targeted.addresses(2));
        assert!(!targeted.addresses(3));
        assert_eq!(targeted.delta, 5);
    }
}
