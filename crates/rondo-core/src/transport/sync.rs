//! External clock synchronization hooks.
//!
//! Clock sources run on threads the engine does not own (the MIDI driver),
//! so they never touch the sequencer. They report through a
//! [`SyncListener`], whose engine implementation turns each hook into an
//! event for the dispatcher. [`SyncState`] records what is being followed
//! for display.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use crate::config::{MAX_BPM, MIN_BPM};
use crate::AtomicFloat;

/// Receives transport changes from an external clock.
pub trait SyncListener: Send + Sync {
    fn on_change_bpm(&self, bpm: f32);
    /// The external position moved to `beat`.
    fn on_change_position(&self, beat: u32);
    fn on_start(&self);
    fn on_stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SyncSource {
    /// Internal clock: the transport runs on its own.
    #[default]
    Internal = 0,
    /// Follows 24 PPQN MIDI beat clock.
    MidiClock = 1,
}

impl SyncSource {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => SyncSource::MidiClock,
            _ => SyncSource::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SyncStatus {
    #[default]
    Unlocked = 0,
    /// Waiting for enough clock to derive a tempo.
    Locking = 1,
    Locked = 2,
}

impl SyncStatus {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => SyncStatus::Locking,
            2 => SyncStatus::Locked,
            _ => SyncStatus::Unlocked,
        }
    }
}

/// Lock-free sync bookkeeping, readable from any thread.
#[derive(Debug)]
pub struct SyncState {
    source: AtomicU8,
    status: AtomicU8,
    external_tempo: AtomicFloat,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            source: AtomicU8::new(SyncSource::Internal as u8),
            status: AtomicU8::new(SyncStatus::Unlocked as u8),
            external_tempo: AtomicFloat::new(120.0),
        }
    }

    pub fn source(&self) -> SyncSource {
        SyncSource::from_u8(self.source.load(Ordering::Acquire))
    }

    /// Switching source resets the lock status.
    pub fn set_source(&self, source: SyncSource) {
        self.source.store(source as u8, Ordering::Release);
        let status = match source {
            SyncSource::Internal => SyncStatus::Unlocked,
            SyncSource::MidiClock => SyncStatus::Locking,
        };
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn is_internal(&self) -> bool {
        self.source() == SyncSource::Internal
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: SyncStatus) {
        let old = self.status.swap(status as u8, Ordering::AcqRel);
        if old != status as u8 {
            info!(?status, "sync status changed");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status() == SyncStatus::Locked
    }

    pub fn external_tempo(&self) -> f32 {
        self.external_tempo.get()
    }

    pub fn set_external_tempo(&self, bpm: f32) {
        self.external_tempo.set(bpm.clamp(MIN_BPM, MAX_BPM));
    }
}
