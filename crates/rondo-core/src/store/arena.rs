//! Fixed arena of published generations.
//!
//! `current` indexes the slot the audio thread should read. A reader pins a
//! slot by bumping its reader count and then re-checking `current`; if a
//! publish moved `current` in between, it unpins and retries. Writers only
//! ever fill slots that are neither current nor pinned, so a pinned slot is
//! never written while it is read, and the value a slot replaces is dropped
//! on the writing (non-realtime) thread.
//!
//! Both sides use `SeqCst` on `current` and the reader counts: a writer that
//! sees zero readers on a slot must also be seen by any reader that pins it
//! afterwards as having moved `current` away.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::{Error, Result};

/// One published slot per possible state: current, pinned by the audio
/// thread, being filled, and a spare.
pub(crate) const GENERATION_SLOTS: usize = 4;

struct Slot<T> {
    value: UnsafeCell<Option<T>>,
    readers: AtomicUsize,
    generation: AtomicU64,
}

pub(crate) struct Arena<T> {
    slots: [Slot<T>; GENERATION_SLOTS],
    current: AtomicUsize,
}

// SAFETY: a slot's value is written only by a writer holding the store's
// publish lock, and only while the slot is not current and has no readers.
// Readers only dereference a slot they pinned while it was current.
unsafe impl<T: Send + Sync> Sync for Arena<T> {}
unsafe impl<T: Send> Send for Arena<T> {}

impl<T> Arena<T> {
    pub(crate) fn new(initial: T) -> Self {
        let mut initial = Some(initial);
        let slots = std::array::from_fn(|i| Slot {
            value: UnsafeCell::new(if i == 0 { initial.take() } else { None }),
            readers: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        });
        Self {
            slots,
            current: AtomicUsize::new(0),
        }
    }

    /// Pins the current slot. Never waits on a writer.
    #[inline]
    pub(crate) fn pin(&self) -> usize {
        loop {
            let idx = self.current.load(Ordering::SeqCst);
            let slot = &self.slots[idx];
            slot.readers.fetch_add(1, Ordering::SeqCst);
            if self.current.load(Ordering::SeqCst) == idx {
                return idx;
            }
            slot.readers.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[inline]
    pub(crate) fn unpin(&self, idx: usize) {
        self.slots[idx].readers.fetch_sub(1, Ordering::SeqCst);
    }

    /// # Safety
    /// `idx` must be pinned by the caller.
    #[inline]
    pub(crate) unsafe fn get(&self, idx: usize) -> &T {
        // A pinned slot was current when pinned, and current slots are filled.
        match &*self.slots[idx].value.get() {
            Some(value) => value,
            None => unreachable!("pinned generation slot is empty"),
        }
    }

    #[inline]
    pub(crate) fn generation_of(&self, idx: usize) -> u64 {
        self.slots[idx].generation.load(Ordering::Acquire)
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.generation_of(self.current.load(Ordering::SeqCst))
    }

    /// Fills a free slot with `value` and makes it current.
    ///
    /// # Safety
    /// Callers must serialize installs and reclaims (the store's publish lock).
    pub(crate) unsafe fn install(&self, value: T, generation: u64) -> Result<()> {
        let current = self.current.load(Ordering::SeqCst);
        let free = (0..GENERATION_SLOTS).find(|&i| {
            i != current && self.slots[i].readers.load(Ordering::SeqCst) == 0
        });
        let Some(idx) = free else {
            return Err(Error::NoFreeGeneration);
        };

        let slot = &self.slots[idx];
        // Drops whatever generation lived here before, on this thread.
        *slot.value.get() = Some(value);
        slot.generation.store(generation, Ordering::Release);
        self.current.store(idx, Ordering::SeqCst);
        Ok(())
    }

    /// Drops retired generations nobody reads. Returns how many were freed.
    ///
    /// # Safety
    /// Same as [`Arena::install`].
    pub(crate) unsafe fn reclaim(&self) -> usize {
        let current = self.current.load(Ordering::SeqCst);
        let mut freed = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if i == current || slot.readers.load(Ordering::SeqCst) != 0 {
                continue;
            }
            if (*slot.value.get()).take().is_some() {
                freed += 1;
            }
        }
        freed
    }

    /// Slots currently pinned by readers.
    pub(crate) fn pinned(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.readers.load(Ordering::SeqCst) > 0)
            .count()
    }
}
