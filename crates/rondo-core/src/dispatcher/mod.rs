//! Event dispatcher: the single writer of engine state.
//!
//! Producers (UI, MIDI driver, clock sync, audio-thread listeners) push
//! [`Event`]s into a bounded lock-free queue through an [`EventSender`].
//! The dispatcher drains the queue in batches, hands sequencer-directed and
//! channel-directed events to a [`DispatchHandler`], and publishes the
//! working copy after every batch. Anything enqueued before a publish is in
//! that publish's generation.
//!
//! The dispatcher runs either on its own worker thread ([`Dispatcher::start`])
//! or synchronously from the caller ([`Dispatcher::process_pending`]), which
//! is what deterministic tests use.

mod event;
mod worker;

pub use event::{Event, EventKind, EventTarget};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::store::{Store, SwapKind};
use crate::transport::SyncListener;
use crate::Result;

/// Extension points run by the dispatcher on the working copy.
///
/// Each returns how much the batch changed, which decides the publish kind.
pub trait DispatchHandler<T>: Send {
    fn on_process_sequencer(&mut self, state: &mut T, events: &[Event]) -> SwapKind;
    fn on_process_channels(&mut self, state: &mut T, events: &[Event]) -> SwapKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    /// Longest the worker sleeps before re-checking for shutdown.
    pub tick: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for DispatcherConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            queue_capacity: config.dispatcher_queue_capacity.max(1),
            batch_size: config.dispatcher_batch_size.max(1),
            tick: Duration::from_millis(config.dispatcher_tick_ms.max(1)),
        }
    }
}

/// Cloneable, non-blocking producer handle. Safe on the audio thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Returns `false` when the queue is full; the event is dropped.
    #[inline]
    pub fn enqueue(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Events rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SyncListener for EventSender {
    fn on_change_bpm(&self, bpm: f32) {
        self.enqueue(Event::new(EventKind::SequencerBpm(bpm)));
    }

    fn on_change_position(&self, beat: u32) {
        self.enqueue(Event::new(EventKind::SequencerGoToBeat(beat)));
    }

    fn on_start(&self) {
        self.enqueue(Event::new(EventKind::SequencerStart));
    }

    fn on_stop(&self) {
        self.enqueue(Event::new(EventKind::SequencerStop));
    }
}

struct Cycle<T> {
    handler: Box<dyn DispatchHandler<T>>,
    batch_in: HeapProd<Event>,
    batch_out: HeapCons<Event>,
    sequencer: Vec<Event>,
    channels: Vec<Event>,
    reported_drops: u64,
}

pub(crate) struct DispatchCore<T> {
    store: Arc<Store<T>>,
    rx: Receiver<Event>,
    dropped: Arc<AtomicU64>,
    cycle: Mutex<Cycle<T>>,
}

impl<T: Clone + Send + Sync> DispatchCore<T> {
    /// Drains the queue batch by batch, publishing after each one.
    /// `first` is an event the caller already took off the queue.
    fn run(&self, mut first: Option<Event>) -> Result<usize> {
        let mut cycle = self.cycle.lock();
        let Cycle {
            handler,
            batch_in,
            batch_out,
            sequencer,
            channels,
            reported_drops,
        } = &mut *cycle;

        let mut total = 0;
        loop {
            if let Some(event) = first.take() {
                let _ = batch_in.try_push(event);
            }
            while !batch_in.is_full() {
                match self.rx.try_recv() {
                    Ok(event) => {
                        let _ = batch_in.try_push(event);
                    }
                    Err(_) => break,
                }
            }
            if batch_out.is_empty() {
                break;
            }

            sequencer.clear();
            channels.clear();
            while let Some(event) = batch_out.try_pop() {
                total += 1;
                match event.target() {
                    EventTarget::Sequencer => sequencer.push(event),
                    EventTarget::Channels => channels.push(event),
                    EventTarget::Both => {
                        sequencer.push(event);
                        channels.push(event);
                    }
                }
            }

            let mut state = self.store.get_mutable()?;
            let mut swap = SwapKind::None;
            if !sequencer.is_empty() {
                swap = swap.max(handler.on_process_sequencer(&mut state, sequencer));
            }
            if !channels.is_empty() {
                swap = swap.max(handler.on_process_channels(&mut state, channels));
            }
            state.publish(swap)?;
            self.store.reclaim();
        }

        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > *reported_drops {
            warn!(dropped = dropped - *reported_drops, "event queue full, events dropped");
            *reported_drops = dropped;
        }
        Ok(total)
    }
}

pub struct Dispatcher<T: Clone + Send + Sync + 'static> {
    core: Arc<DispatchCore<T>>,
    sender: EventSender,
    config: DispatcherConfig,
    shutdown: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> Dispatcher<T> {
    pub fn new(
        store: Arc<Store<T>>,
        handler: impl DispatchHandler<T> + 'static,
        config: DispatcherConfig,
    ) -> Self {
        let (tx, rx) = bounded(config.queue_capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let (batch_in, batch_out) = HeapRb::new(config.batch_size).split();
        let cycle = Cycle {
            handler: Box::new(handler),
            batch_in,
            batch_out,
            sequencer: Vec::with_capacity(config.batch_size),
            channels: Vec::with_capacity(config.batch_size),
            reported_drops: 0,
        };

        Self {
            core: Arc::new(DispatchCore {
                store,
                rx,
                dropped: Arc::clone(&dropped),
                cycle: Mutex::new(cycle),
            }),
            sender: EventSender { tx, dropped },
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Spawns the worker thread. No-op if it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.thread_handle.is_some() {
            return Ok(());
        }
        self.shutdown.store(false, Ordering::SeqCst);
        let handle = worker::spawn(
            Arc::clone(&self.core),
            Arc::clone(&self.shutdown),
            self.config.tick,
        )?;
        self.thread_handle = Some(handle);
        debug!("dispatcher started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            debug!("dispatcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Applies everything queued so far on the calling thread, which must be
    /// registered as MAIN or worker. Returns the number of events applied.
    pub fn process_pending(&self) -> Result<usize> {
        self.core.run(None)
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
