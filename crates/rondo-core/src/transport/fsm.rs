//! Sequencer transport state machine.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SequencerStatus {
    #[default]
    Stopped = 0,
    /// Counting in, or armed to start on an input signal.
    Waiting = 1,
    Running = 2,
}

impl SequencerStatus {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => SequencerStatus::Waiting,
            2 => SequencerStatus::Running,
            _ => SequencerStatus::Stopped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Start, counting in first when `count_in` is set.
    Start { count_in: bool },
    /// Arm and wait for the input trigger.
    StartOnSignal,
    /// The count-in ran out (audio thread).
    CountInDone,
    /// The input trigger fired.
    Signal,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    None,
    StatusChanged(SequencerStatus),
}

/// Pure transition function; callers store the result.
pub fn transition(status: SequencerStatus, event: TransportEvent) -> TransitionResult {
    use SequencerStatus::*;
    use TransportEvent::*;

    let next = match (status, event) {
        (Stopped, Start { count_in: true }) => Waiting,
        (Stopped, Start { count_in: false }) => Running,
        (Stopped, StartOnSignal) => Waiting,
        (Waiting, CountInDone | Signal) => Running,
        (Waiting | Running, Stop) => Stopped,
        _ => return TransitionResult::None,
    };
    TransitionResult::StatusChanged(next)
}

/// Atomic holder for [`SequencerStatus`], shared by every generation.
#[derive(Debug, Default)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    #[inline]
    pub fn load(&self) -> SequencerStatus {
        SequencerStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, status: SequencerStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Applies `event`, returning the new status if it changed.
    ///
    /// Both the dispatcher and the audio thread (count-in end) apply events,
    /// so the update is a compare-and-swap.
    pub fn apply(&self, event: TransportEvent) -> Option<SequencerStatus> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let TransitionResult::StatusChanged(next) =
                transition(SequencerStatus::from_u8(current), event)
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
