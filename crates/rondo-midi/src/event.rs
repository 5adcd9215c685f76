//! Packed channel MIDI events.
//!
//! A [`MidiEvent`] stores a channel message in a single `u32`:
//!
//! ```text
//! byte 1 (MSB)   byte 2   byte 3     byte 4
//! status|chan    note     velocity   unused
//! ```
//!
//! The packed form is `Copy`, cheap to compare and is what recorded actions
//! and learn bindings store.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status nibbles of the channel messages the engine understands.
///
/// `NoteKill` is engine-internal: it never travels on a MIDI cable and marks
/// an action that stops a one-shot sample immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MidiStatus {
    NoteKill = 0x70,
    NoteOff = 0x80,
    NoteOn = 0x90,
    PolyPressure = 0xA0,
    ControlChange = 0xB0,
    ProgramChange = 0xC0,
    ChannelPressure = 0xD0,
    PitchBend = 0xE0,
}

impl MidiStatus {
    pub fn from_u8(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x70 => Some(MidiStatus::NoteKill),
            0x80 => Some(MidiStatus::NoteOff),
            0x90 => Some(MidiStatus::NoteOn),
            0xA0 => Some(MidiStatus::PolyPressure),
            0xB0 => Some(MidiStatus::ControlChange),
            0xC0 => Some(MidiStatus::ProgramChange),
            0xD0 => Some(MidiStatus::ChannelPressure),
            0xE0 => Some(MidiStatus::PitchBend),
            _ => None,
        }
    }
}

/// CC number for "All Notes Off".
pub const ALL_NOTES_OFF: u8 = 123;

pub const MAX_VELOCITY: u8 = 127;

/// A channel MIDI message packed into 32 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MidiEvent {
    raw: u32,
}

impl MidiEvent {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    /// Builds an event from the three bytes of a channel message.
    #[inline]
    pub const fn from_bytes3(byte1: u8, byte2: u8, byte3: u8) -> Self {
        Self {
            raw: ((byte1 as u32) << 24) | ((byte2 as u32) << 16) | ((byte3 as u32) << 8),
        }
    }

    #[inline]
    pub fn new(status: MidiStatus, channel: u8, note: u8, velocity: u8) -> Self {
        Self::from_bytes3(
            status as u8 | (channel & 0x0F),
            note & 0x7F,
            velocity.min(MAX_VELOCITY),
        )
    }

    #[inline]
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(MidiStatus::NoteOn, channel, note, velocity)
    }

    #[inline]
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(MidiStatus::NoteOff, channel, note, velocity)
    }

    #[inline]
    pub fn note_kill(channel: u8, note: u8) -> Self {
        Self::new(MidiStatus::NoteKill, channel, note, 0)
    }

    #[inline]
    pub fn control_change(channel: u8, control: u8, value: u8) -> Self {
        Self::new(MidiStatus::ControlChange, channel, control, value)
    }

    #[inline]
    pub fn all_notes_off(channel: u8) -> Self {
        Self::control_change(channel, ALL_NOTES_OFF, 0)
    }

    /// Parses a channel message from wire bytes.
    ///
    /// System messages are rejected; use [`crate::parse`] when the input may
    /// carry clock or transport messages.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match crate::parse(bytes)? {
            crate::MidiMessage::Channel(event) => Ok(event),
            crate::MidiMessage::Clock(_) => Err(Error::Unsupported(bytes[0])),
        }
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Raw value with the velocity byte masked out. Learn bindings match on this.
    #[inline]
    pub const fn raw_no_velocity(&self) -> u32 {
        self.raw & 0xFFFF_0000
    }

    /// Status nibble, e.g. `0x90` for note on.
    #[inline]
    pub const fn status_byte(&self) -> u8 {
        ((self.raw & 0xF000_0000) >> 24) as u8
    }

    #[inline]
    pub fn status(&self) -> Option<MidiStatus> {
        MidiStatus::from_u8(self.status_byte())
    }

    #[inline]
    pub const fn channel(&self) -> u8 {
        ((self.raw & 0x0F00_0000) >> 24) as u8
    }

    #[inline]
    pub const fn note(&self) -> u8 {
        ((self.raw & 0x00FF_0000) >> 16) as u8
    }

    #[inline]
    pub const fn velocity(&self) -> u8 {
        ((self.raw & 0x0000_FF00) >> 8) as u8
    }

    /// Velocity mapped to `0.0..=1.0`.
    #[inline]
    pub fn velocity_f32(&self) -> f32 {
        self.velocity() as f32 / MAX_VELOCITY as f32
    }

    #[inline]
    pub fn with_channel(self, channel: u8) -> Self {
        Self {
            raw: (self.raw & 0xF0FF_FFFF) | (((channel & 0x0F) as u32) << 24),
        }
    }

    #[inline]
    pub fn with_velocity(self, velocity: u8) -> Self {
        Self {
            raw: (self.raw & 0xFFFF_00FF) | ((velocity.min(MAX_VELOCITY) as u32) << 8),
        }
    }

    /// A note on with velocity zero is a note off; rewrite it as such.
    pub fn fix_velocity_zero(self) -> Self {
        if self.is_note_on() && self.velocity() == 0 {
            Self {
                raw: (self.raw & 0x0FFF_FFFF) | ((MidiStatus::NoteOff as u32) << 24),
            }
        } else {
            self
        }
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.status_byte() == MidiStatus::NoteOn as u8
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        self.status_byte() == MidiStatus::NoteOff as u8
    }

    #[inline]
    pub fn is_note_on_off(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    /// Wire bytes, or `None` for engine-internal statuses.
    pub fn to_bytes(&self) -> Option<[u8; 3]> {
        if self.status_byte() < MidiStatus::NoteOff as u8 {
            return None;
        }
        Some([
            (self.raw >> 24) as u8,
            self.note() & 0x7F,
            self.velocity() & 0x7F,
        ])
    }
}
