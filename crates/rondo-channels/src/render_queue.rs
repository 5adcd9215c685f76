//! Frame-exact playback commands for one channel.
//!
//! Decisions made off the audio thread (a key press, a stop) become a
//! [`RenderCommand`] that the sample player applies at its exact frame.
//! Non-realtime producers go through an SPSC ring. Audio-thread producers
//! (advancer, quantizer callbacks) append to a pending list that only the
//! audio thread touches; the same list holds commands carried over from a
//! previous buffer.

use std::fmt;

use arrayvec::ArrayVec;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use rondo_core::Frame;

/// Commands a channel can have in flight.
pub const RENDER_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Start rendering.
    Normal,
    /// Jump back to the begin point.
    Rewind,
    /// Stop rendering and turn the channel off.
    Stop,
    /// Keep rendering, turn the channel off once the play head reaches the
    /// end point.
    StopAtEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCommand {
    pub mode: RenderMode,
    /// Offset inside the buffer the command lands in.
    pub frame: Frame,
}

impl RenderCommand {
    pub fn new(mode: RenderMode, frame: Frame) -> Self {
        Self { mode, frame }
    }
}

pub type RenderCommands = ArrayVec<RenderCommand, RENDER_QUEUE_CAPACITY>;

pub struct RenderQueue {
    producer: Mutex<HeapProd<RenderCommand>>,
    consumer: Mutex<HeapCons<RenderCommand>>,
    pending: Mutex<RenderCommands>,
}

impl RenderQueue {
    pub fn new() -> Self {
        let (producer, consumer) = HeapRb::new(RENDER_QUEUE_CAPACITY).split();
        Self {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            pending: Mutex::new(ArrayVec::new()),
        }
    }

    /// Non-realtime push. Returns false if the queue is full.
    pub fn push(&self, command: RenderCommand) -> bool {
        self.producer.lock().try_push(command).is_ok()
    }

    /// Audio-thread push. Never blocks.
    pub fn push_rt(&self, command: RenderCommand) -> bool {
        match self.pending.try_lock() {
            Some(mut pending) => pending.try_push(command).is_ok(),
            None => false,
        }
    }

    /// Audio thread. Fills `out` with the commands due in a buffer of
    /// `frames`, ordered by frame and then by arrival. Later commands stay
    /// queued with their frame reduced by `frames`.
    pub fn drain(&self, frames: Frame, out: &mut RenderCommands) {
        out.clear();
        let Some(mut pending) = self.pending.try_lock() else {
            return;
        };
        if let Some(mut consumer) = self.consumer.try_lock() {
            while !pending.is_full() {
                match consumer.try_pop() {
                    Some(command) => pending.push(command),
                    None => break,
                }
            }
        }

        let mut kept = 0;
        for i in 0..pending.len() {
            let command = pending[i];
            if command.frame < frames {
                let at = out.partition_point(|c| c.frame <= command.frame);
                let _ = out.try_insert(at, command);
            } else {
                pending[kept] = RenderCommand::new(command.mode, command.frame - frames);
                kept += 1;
            }
        }
        pending.truncate(kept);
    }

    /// Whether nothing is queued. Racy outside the audio thread.
    pub fn is_empty(&self) -> bool {
        let pending_empty = self.pending.try_lock().map_or(false, |p| p.is_empty());
        pending_empty && self.consumer.try_lock().map_or(false, |c| c.is_empty())
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue").finish_non_exhaustive()
    }
}
