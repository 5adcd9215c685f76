//! Generation-versioned engine state.
//!
//! A [`Store`] holds one mutable working copy, touched only by non-realtime
//! threads, and a small arena of immutable published generations that the
//! audio thread reads. `publish` clones the working copy into a free arena
//! slot and makes it current; the audio thread pins whichever generation is
//! current at the start of its callback and keeps it, untouched, until the
//! [`SnapshotGuard`] drops.
//!
//! ```ignore
//! let store = Store::new(Layout::default());
//! store.register_thread(ThreadRole::Main, false)?;
//!
//! let mut layout = store.get_mutable()?;
//! layout.bpm = 90.0;
//! layout.publish(SwapKind::Soft)?;
//!
//! // audio thread
//! store.register_thread(ThreadRole::Audio, true)?;
//! let snapshot = store.get_realtime_snapshot()?;
//! render(&snapshot);
//! ```
//!
//! Misuse (wrong or missing thread role, registering twice) panics in debug
//! builds and returns an error in release builds.

mod arena;
mod registry;

pub use registry::ThreadRole;

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::{Error, Result};
use arena::Arena;
use registry::ThreadRegistry;

/// How much downstream observers must rebuild after a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SwapKind {
    /// Nothing observable changed.
    #[default]
    None,
    /// Values changed (volume, mute, bpm, ...).
    Soft,
    /// Structure changed (channels added or removed).
    Hard,
}

/// Sent to subscribers after every publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishNotice {
    pub generation: u64,
    pub kind: SwapKind,
}

pub struct Store<T> {
    registry: ThreadRegistry,
    working: Mutex<T>,
    arena: Arena<T>,
    /// Serializes installs and reclaims; holds the last generation number.
    publish_lock: Mutex<u64>,
    observers: Mutex<Vec<Sender<PublishNotice>>>,
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Creates a store whose generation 0 is a copy of `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            registry: ThreadRegistry::new(),
            arena: Arena::new(initial.clone()),
            working: Mutex::new(initial),
            publish_lock: Mutex::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Declares the calling thread's role. Must be called once per thread.
    pub fn register_thread(&self, role: ThreadRole, realtime: bool) -> Result<()> {
        self.registry.register(role, realtime).map_err(misuse)?;
        debug!(?role, "thread registered");
        Ok(())
    }

    /// Registers the calling thread as `role` unless it already is.
    pub fn ensure_registered(&self, role: ThreadRole) -> Result<()> {
        match self.registry.current() {
            Some(current) if current == role => Ok(()),
            Some(other) => Err(misuse(Error::WrongRole(other))),
            None => self.register_thread(role, role.is_realtime()),
        }
    }

    /// Binds the calling device thread as AUDIO on its first callback.
    #[inline]
    pub fn ensure_audio_thread(&self) -> Result<()> {
        if self.registry.current() == Some(ThreadRole::Audio) {
            return Ok(());
        }
        self.ensure_registered(ThreadRole::Audio)
    }

    #[inline]
    pub fn thread_role(&self) -> Option<ThreadRole> {
        self.registry.current()
    }

    /// Lets another thread become the audio thread (device restart).
    pub fn release_audio_thread(&self) {
        self.registry.release_audio();
    }

    /// The working copy. MAIN and worker threads only.
    pub fn get_mutable(&self) -> Result<WorkingCopy<'_, T>> {
        self.require(&[ThreadRole::Main, ThreadRole::Worker])?;
        Ok(WorkingCopy {
            store: self,
            guard: self.working.lock(),
        })
    }

    /// Reads the working copy from any non-realtime thread.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.require(&[ThreadRole::Main, ThreadRole::Worker, ThreadRole::Midi])?;
        Ok(f(&self.working.lock()))
    }

    /// Pins the current generation. AUDIO thread only; never blocks.
    #[inline]
    pub fn get_realtime_snapshot(&self) -> Result<SnapshotGuard<'_, T>> {
        self.require(&[ThreadRole::Audio])?;
        let idx = self.arena.pin();
        Ok(SnapshotGuard {
            arena: &self.arena,
            idx,
            _not_send: PhantomData,
        })
    }

    /// Installs a copy of the working copy as the new current generation.
    pub fn publish(&self, kind: SwapKind) -> Result<u64> {
        self.require(&[ThreadRole::Main, ThreadRole::Worker])?;
        let working = self.working.lock();
        self.install((*working).clone(), kind)
    }

    /// Drops retired generations that no reader holds.
    pub fn reclaim(&self) -> usize {
        if self.require(&[ThreadRole::Main, ThreadRole::Worker]).is_err() {
            return 0;
        }
        let _serial = self.publish_lock.lock();
        // SAFETY: installs and reclaims are serialized by `publish_lock`.
        let freed = unsafe { self.arena.reclaim() };
        if freed > 0 {
            trace!(freed, "reclaimed generations");
        }
        freed
    }

    /// Number of the current generation. Generation 0 is the initial state.
    pub fn generation(&self) -> u64 {
        self.arena.current_generation()
    }

    /// Generations currently pinned by a realtime reader.
    pub fn pinned(&self) -> usize {
        self.arena.pinned()
    }

    pub fn subscribe(&self) -> Receiver<PublishNotice> {
        let (tx, rx) = unbounded();
        self.observers.lock().push(tx);
        rx
    }

    fn install(&self, value: T, kind: SwapKind) -> Result<u64> {
        let mut last = self.publish_lock.lock();
        let generation = *last + 1;
        // SAFETY: installs and reclaims are serialized by `publish_lock`.
        unsafe { self.arena.install(value, generation) }?;
        *last = generation;
        drop(last);

        if kind == SwapKind::Hard {
            debug!(generation, "structural publish");
        }
        let notice = PublishNotice { generation, kind };
        self.observers
            .lock()
            .retain(|tx| tx.send(notice).is_ok());
        Ok(generation)
    }

    fn require(&self, allowed: &[ThreadRole]) -> Result<ThreadRole> {
        match self.registry.current() {
            Some(role) if allowed.contains(&role) => Ok(role),
            Some(role) => Err(misuse(Error::WrongRole(role))),
            None => Err(misuse(Error::UnregisteredThread)),
        }
    }
}

/// Thread-role violations are programming errors.
fn misuse(err: Error) -> Error {
    if cfg!(debug_assertions) {
        panic!("state store misuse: {err}");
    }
    err
}

/// The locked working copy. Publish it, or drop it to keep editing later.
pub struct WorkingCopy<'a, T: Clone + Send + Sync> {
    store: &'a Store<T>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T: Clone + Send + Sync> WorkingCopy<'a, T> {
    pub fn publish(self, kind: SwapKind) -> Result<u64> {
        let WorkingCopy { store, guard } = self;
        let generation = store.install((*guard).clone(), kind);
        drop(guard);
        generation
    }
}

impl<T: Clone + Send + Sync> Deref for WorkingCopy<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: Clone + Send + Sync> DerefMut for WorkingCopy<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// A pinned published generation. Stays valid however many publishes happen
/// while it is held.
pub struct SnapshotGuard<'a, T> {
    arena: &'a Arena<T>,
    idx: usize,
    _not_send: PhantomData<*const ()>,
}

impl<T> SnapshotGuard<'_, T> {
    #[inline]
    pub fn generation(&self) -> u64 {
        self.arena.generation_of(self.idx)
    }
}

impl<T> Deref for SnapshotGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: `idx` stays pinned until this guard drops.
        unsafe { self.arena.get(self.idx) }
    }
}

impl<T> Drop for SnapshotGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.arena.unpin(self.idx);
    }
}
