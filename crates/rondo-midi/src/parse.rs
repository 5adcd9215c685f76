//! Wire-byte parsing for inbound MIDI.

use midi_msg::{MidiMsg, SystemCommonMsg, SystemRealTimeMsg};
use tracing::debug;

use crate::{ClockMessage, Error, MidiEvent, Result};

/// An inbound message the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    Channel(MidiEvent),
    Clock(ClockMessage),
}

/// Classifies raw bytes from a MIDI driver.
///
/// Channel messages keep their original bytes in packed form; clock and
/// transport messages become [`ClockMessage`]s. Everything else (sysex,
/// active sensing, ...) is `Error::Unsupported`.
pub fn parse(bytes: &[u8]) -> Result<MidiMessage> {
    let first = *bytes.first().ok_or(Error::Empty)?;
    let (msg, _len) = MidiMsg::from_midi(bytes)?;

    match msg {
        MidiMsg::ChannelVoice { .. } | MidiMsg::ChannelMode { .. } => {
            let note = bytes.get(1).copied().unwrap_or(0);
            let velocity = bytes.get(2).copied().unwrap_or(0);
            Ok(MidiMessage::Channel(MidiEvent::from_bytes3(
                first, note, velocity,
            )))
        }
        MidiMsg::SystemRealTime { msg } => match msg {
            SystemRealTimeMsg::TimingClock => Ok(MidiMessage::Clock(ClockMessage::Tick)),
            SystemRealTimeMsg::Start => Ok(MidiMessage::Clock(ClockMessage::Start)),
            SystemRealTimeMsg::Continue => Ok(MidiMessage::Clock(ClockMessage::Continue)),
            SystemRealTimeMsg::Stop => Ok(MidiMessage::Clock(ClockMessage::Stop)),
            _ => Err(Error::Unsupported(first)),
        },
        MidiMsg::SystemCommon {
            msg: SystemCommonMsg::SongPosition(position),
        } => Ok(MidiMessage::Clock(ClockMessage::SongPosition(position))),
        _ => {
            debug!(status = first, "ignoring unsupported MIDI message");
            Err(Error::Unsupported(first))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let msg = parse(&[0x91, 60, 100]).unwrap();
        assert_eq!(msg, MidiMessage::Channel(MidiEvent::note_on(1, 60, 100)));
    }

    #[test]
    fn test_parse_clock_messages() {
        assert_eq!(parse(&[0xF8]).unwrap(), MidiMessage::Clock(ClockMessage::Tick));
        assert_eq!(parse(&[0xFA]).unwrap(), MidiMessage::Clock(ClockMessage::Start));
        assert_eq!(parse(&[0xFC]).unwrap(), MidiMessage::Clock(ClockMessage::Stop));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(parse(&[]), Err(Error::Empty)));
    }

    #[test]
    fn test_channel_event_from_bytes_rejects_clock() {
        assert!(MidiEvent::from_bytes(&[0xF8]).is_err());
        assert!(MidiEvent::from_bytes(&[0x80, 10, 0]).unwrap().is_note_off());
    }
}
