//! Outbound MIDI.
//!
//! Channels emit MIDI from inside the audio callback, so a [`MidiSink`] must
//! never block. [`QueueSink`] forwards into a bounded channel that a driver
//! thread drains.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{ClockMessage, MidiEvent};

pub trait MidiSink: Send + Sync {
    /// Called from the audio thread. Must not block or allocate.
    fn send(&self, event: MidiEvent);

    fn send_clock(&self, _msg: ClockMessage) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MidiSink for NullSink {
    fn send(&self, _event: MidiEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMidi {
    Channel(MidiEvent),
    Clock(ClockMessage),
}

impl OutboundMidi {
    /// Wire bytes and their length.
    pub fn to_bytes(&self) -> Option<([u8; 3], usize)> {
        match self {
            OutboundMidi::Channel(event) => event.to_bytes().map(|b| (b, 3)),
            OutboundMidi::Clock(msg) => Some(msg.to_bytes()),
        }
    }
}

/// Lock-free sink backed by a bounded crossbeam channel.
pub struct QueueSink {
    tx: Sender<OutboundMidi>,
    dropped: AtomicU64,
}

impl QueueSink {
    pub fn new(capacity: usize) -> (Self, Receiver<OutboundMidi>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Messages lost because the driver thread fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, msg: OutboundMidi) {
        if self.tx.try_send(msg).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl MidiSink for QueueSink {
    fn send(&self, event: MidiEvent) {
        self.push(OutboundMidi::Channel(event));
    }

    fn send_clock(&self, msg: ClockMessage) {
        self.push(OutboundMidi::Clock(msg));
    }
}
