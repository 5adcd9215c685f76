//! Grid-aligned deferred actions.
//!
//! Channels register a callback per action kind once (`schedule`), then arm
//! it whenever a press should land on the grid (`trigger`). The sequencer
//! calls [`Quantizer::fire`] from the audio thread at every grid boundary;
//! each armed slot runs exactly once, receiving the boundary's offset inside
//! the current buffer.
//!
//! The callback table is plain data and is cloned with the layout that owns
//! it. The armed flags are shared by every clone, so arming or disarming on
//! the dispatcher thread is seen by the audio thread without a publish.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{ChannelId, Error, Frame, Result};

/// Maximum number of scheduled slots.
pub const QUANTIZER_SLOTS: usize = 512;

/// Action kind in the low byte, channel id above it.
pub type SlotId = u64;

pub type QuantizerCallback = Arc<dyn Fn(Frame) + Send + Sync>;

#[inline]
pub fn slot_id(channel_id: ChannelId, action: u8) -> SlotId {
    (u64::from(channel_id) << 8) | u64::from(action)
}

struct Armed {
    flags: Box<[AtomicBool]>,
    count: AtomicUsize,
}

#[derive(Clone)]
pub struct Quantizer {
    index: HashMap<SlotId, usize>,
    callbacks: Vec<Option<(SlotId, QuantizerCallback)>>,
    armed: Arc<Armed>,
    step: Frame,
}

impl fmt::Debug for Quantizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quantizer")
            .field("slots", &self.index.len())
            .field("armed", &self.armed.count.load(Ordering::Relaxed))
            .field("step", &self.step)
            .finish()
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Quantizer {
    pub fn new() -> Self {
        let flags = (0..QUANTIZER_SLOTS).map(|_| AtomicBool::new(false)).collect();
        Self {
            index: HashMap::new(),
            callbacks: Vec::new(),
            armed: Arc::new(Armed {
                flags,
                count: AtomicUsize::new(0),
            }),
            step: 0,
        }
    }

    /// Grid size in frames; 0 disables quantization.
    #[inline]
    pub fn step(&self) -> Frame {
        self.step
    }

    pub(crate) fn set_step(&mut self, step: Frame) {
        self.step = step;
    }

    #[inline]
    pub fn can_quantize(&self, transport_running: bool) -> bool {
        self.step > 0 && transport_running
    }

    /// Registers (or replaces) the callback for `slot`.
    pub fn schedule(&mut self, slot: SlotId, callback: QuantizerCallback) -> Result<()> {
        if let Some(&i) = self.index.get(&slot) {
            self.callbacks[i] = Some((slot, callback));
            return Ok(());
        }
        let free = self.callbacks.iter().position(Option::is_none);
        let i = match free {
            Some(i) => i,
            None if self.callbacks.len() < QUANTIZER_SLOTS => {
                self.callbacks.push(None);
                self.callbacks.len() - 1
            }
            None => return Err(Error::QuantizerFull(QUANTIZER_SLOTS)),
        };
        self.callbacks[i] = Some((slot, callback));
        self.index.insert(slot, i);
        Ok(())
    }

    pub fn unschedule(&mut self, slot: SlotId) {
        if let Some(i) = self.index.remove(&slot) {
            self.disarm_index(i);
            self.callbacks[i] = None;
        }
    }

    /// Arms `slot` to fire at the next grid boundary. Unknown slots are ignored.
    pub fn trigger(&self, slot: SlotId) {
        if let Some(&i) = self.index.get(&slot) {
            if !self.armed.flags[i].swap(true, Ordering::AcqRel) {
                self.armed.count.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Cancels an armed slot before it fires.
    pub fn disarm(&self, slot: SlotId) {
        if let Some(&i) = self.index.get(&slot) {
            self.disarm_index(i);
        }
    }

    /// Cancels every armed slot.
    pub fn clear(&self) {
        for i in 0..self.callbacks.len() {
            self.disarm_index(i);
        }
    }

    pub fn is_armed(&self, slot: SlotId) -> bool {
        self.index
            .get(&slot)
            .is_some_and(|&i| self.armed.flags[i].load(Ordering::Acquire))
    }

    /// Whether any slot is armed and waiting for a boundary.
    pub fn has_been_triggered(&self) -> bool {
        self.armed.count.load(Ordering::Acquire) > 0
    }

    /// Runs every armed callback once. Audio thread, at a grid boundary.
    #[inline]
    pub fn fire(&self, local_frame: Frame) {
        if self.armed.count.load(Ordering::Acquire) == 0 {
            return;
        }
        for (i, entry) in self.callbacks.iter().enumerate() {
            let Some((_, callback)) = entry else {
                continue;
            };
            if self.armed.flags[i].swap(false, Ordering::AcqRel) {
                self.armed.count.fetch_sub(1, Ordering::AcqRel);
                callback(local_frame);
            }
        }
    }

    fn disarm_index(&self, i: usize) {
        if self.armed.flags[i].swap(false, Ordering::AcqRel) {
            self.armed.count.fetch_sub(1, Ordering::AcqRel);
        }
    }
}
