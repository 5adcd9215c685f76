//! Channel playback state machine.
//!
//! `play_status` only moves through [`transition`]. Every caller (reactor,
//! advancer, quantizer callbacks, the sample player) names a
//! [`PlayTrigger`] and the cell decides whether it applies.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelStatus {
    #[default]
    Off = 0,
    /// Armed to start on the next first beat or bar.
    Wait = 1,
    Play = 2,
    /// Playing, stops at the natural end of the loop.
    Ending = 3,
}

impl ChannelStatus {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => ChannelStatus::Wait,
            2 => ChannelStatus::Play,
            3 => ChannelStatus::Ending,
            _ => ChannelStatus::Off,
        }
    }

    /// Audible: playing or playing out its last round.
    #[inline]
    pub fn is_playing(self) -> bool {
        matches!(self, ChannelStatus::Play | ChannelStatus::Ending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTrigger {
    /// OFF or WAIT to PLAY.
    Start,
    /// OFF to WAIT.
    Arm,
    /// WAIT to OFF.
    Cancel,
    /// PLAY to ENDING.
    RequestEnd,
    /// ENDING back to PLAY.
    Resume,
    /// Any active status to OFF.
    Stop,
    /// PLAY back to WAIT, for loop-once modes at the end of the sample.
    Rearm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    None,
    StatusChanged(ChannelStatus),
}

pub fn transition(status: ChannelStatus, trigger: PlayTrigger) -> TransitionResult {
    use ChannelStatus::*;
    use PlayTrigger::*;

    let next = match (status, trigger) {
        (Off | Wait, Start) => Play,
        (Off, Arm) => Wait,
        (Wait, Cancel) => Off,
        (Play, RequestEnd) => Ending,
        (Ending, Resume) => Play,
        (Wait | Play | Ending, Stop) => Off,
        (Play, Rearm) => Wait,
        _ => return TransitionResult::None,
    };
    TransitionResult::StatusChanged(next)
}

/// Playback status shared by every generation of a channel.
///
/// The dispatcher and the audio thread both apply triggers, so updates are a
/// compare-and-swap over the pure [`transition`].
#[derive(Debug, Default)]
pub struct PlayStatusCell(AtomicU8);

impl PlayStatusCell {
    #[inline]
    pub fn load(&self) -> ChannelStatus {
        ChannelStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Applies `trigger`, returning the new status if it changed.
    pub fn apply(&self, trigger: PlayTrigger) -> Option<ChannelStatus> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let TransitionResult::StatusChanged(next) =
                transition(ChannelStatus::from_u8(current), trigger)
            else {
                return None;
            };
            match self.0.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(next),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Status of recorded-action playback. Moves freely: the read-actions
/// toggle can jump WAIT to PLAY or PLAY to ENDING depending on settings.
#[derive(Debug, Default)]
pub struct RecStatusCell(AtomicU8);

impl RecStatusCell {
    #[inline]
    pub fn load(&self) -> ChannelStatus {
        ChannelStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, status: ChannelStatus) {
        self.0.store(status as u8, Ordering::Release);
    }
}
