//! Inbound MIDI: learn bindings, channel input and clock sync.
//!
//! [`MidiInput`] lives on the MIDI driver's thread. It never touches engine
//! state directly; every message becomes events for the dispatcher.

use std::sync::Arc;

use rondo_core::{
    Event, EventKind, EventSender, Store, SyncListener, SyncSource, SyncState, SyncStatus,
    ThreadRole,
};
use rondo_midi::{parse, ClockFollower, ClockMessage, ClockSignal, MidiEvent, MidiMessage};
use tracing::debug;

use crate::layout::Layout;
use crate::Result;

pub struct MidiInput {
    store: Arc<Store<Layout>>,
    sender: EventSender,
    sync: Arc<SyncState>,
    follower: ClockFollower,
    pending: Vec<Event>,
}

impl MidiInput {
    pub(crate) fn new(
        store: Arc<Store<Layout>>,
        sender: EventSender,
        sync: Arc<SyncState>,
    ) -> Self {
        Self {
            store,
            sender,
            sync,
            follower: ClockFollower::new(),
            pending: Vec::new(),
        }
    }

    /// Feeds one message received at `timestamp` seconds. Returns how many
    /// events were queued.
    pub fn receive(&mut self, bytes: &[u8], timestamp: f64) -> Result<usize> {
        if self.store.thread_role().is_none() {
            self.store.register_thread(ThreadRole::Midi, false)?;
        }
        match parse(bytes)? {
            MidiMessage::Channel(event) => self.on_channel(event),
            MidiMessage::Clock(msg) => self.on_clock(msg, timestamp),
        }
    }

    fn on_channel(&mut self, event: MidiEvent) -> Result<usize> {
        self.pending.clear();
        self.pending.push(Event::new(EventKind::Midi(event)));
        let pending = &mut self.pending;
        self.store.read(|layout| {
            pending.extend(
                layout
                    .channels
                    .iter()
                    .filter_map(|ch| ch.bindings.translate(ch.id, event)),
            );
            pending.extend(
                layout
                    .master_bindings
                    .translate(event, &layout.transport_view()),
            );
        })?;
        Ok(self
            .pending
            .iter()
            .filter(|e| self.sender.enqueue(**e))
            .count())
    }

    fn on_clock(&mut self, msg: ClockMessage, timestamp: f64) -> Result<usize> {
        if self.sync.source() != SyncSource::MidiClock {
            return Ok(0);
        }
        let beats = self.store.read(|layout| layout.sequencer.beats())?;
        let Some(signal) = self.follower.receive(msg, timestamp, beats) else {
            return Ok(0);
        };
        debug!(?signal, "clock signal");
        match signal {
            ClockSignal::Start => self.sender.on_start(),
            ClockSignal::Stop => self.sender.on_stop(),
            ClockSignal::Bpm(bpm) => {
                self.sync.set_external_tempo(bpm);
                self.sync.set_status(SyncStatus::Locked);
                self.sender.on_change_bpm(bpm);
            }
            ClockSignal::Position(beat) => self.sender.on_change_position(beat),
        }
        Ok(1)
    }
}
