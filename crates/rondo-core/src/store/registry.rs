//! Per-store thread roles.
//!
//! Every thread that touches a [`Store`](super::Store) declares once what it
//! is. Roles are kept in a thread-local table keyed by store id, so several
//! stores (several engines in one test binary) do not see each other's
//! registrations.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// The device callback. Hard deadline: never blocks, never allocates.
    Audio,
    /// UI-originated mutation.
    Main,
    /// The MIDI driver's input callback.
    Midi,
    /// The event dispatcher or another background worker.
    Worker,
}

impl ThreadRole {
    #[inline]
    pub fn is_realtime(self) -> bool {
        matches!(self, ThreadRole::Audio)
    }
}

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ROLES: RefCell<SmallVec<[(u64, ThreadRole); 4]>> = RefCell::new(SmallVec::new());
}

pub(crate) struct ThreadRegistry {
    store_id: u64,
    audio_thread: Mutex<Option<ThreadId>>,
}

impl ThreadRegistry {
    pub(crate) fn new() -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            audio_thread: Mutex::new(None),
        }
    }

    pub(crate) fn register(&self, role: ThreadRole, realtime: bool) -> Result<()> {
        if role.is_realtime() != realtime {
            return Err(Error::RoleMismatch { role, realtime });
        }
        if let Some(existing) = self.current() {
            return Err(Error::ThreadAlreadyRegistered(existing));
        }
        if role == ThreadRole::Audio {
            let mut audio = self.audio_thread.lock();
            if audio.is_some() {
                return Err(Error::AudioRoleTaken);
            }
            *audio = Some(thread::current().id());
        }
        ROLES.with(|roles| roles.borrow_mut().push((self.store_id, role)));
        Ok(())
    }

    /// Role of the calling thread. Allocation free, safe on the audio thread.
    #[inline]
    pub(crate) fn current(&self) -> Option<ThreadRole> {
        ROLES.with(|roles| {
            roles
                .borrow()
                .iter()
                .find(|(id, _)| *id == self.store_id)
                .map(|(_, role)| *role)
        })
    }

    /// Frees the audio role so a new device thread can take it.
    ///
    /// The old thread keeps its local entry; it must not render again.
    pub(crate) fn release_audio(&self) {
        *self.audio_thread.lock() = None;
        ROLES.with(|roles| {
            roles
                .borrow_mut()
                .retain(|(id, role)| !(*id == self.store_id && *role == ThreadRole::Audio))
        });
    }
}

impl Drop for ThreadRegistry {
    fn drop(&mut self) {
        // Entries on other threads die with those threads.
        let store_id = self.store_id;
        let _ = ROLES.try_with(|roles| roles.borrow_mut().retain(|(id, _)| *id != store_id));
    }
}
