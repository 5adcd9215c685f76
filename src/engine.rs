//! Engine that owns the layout store, dispatcher and realtime renderer.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rondo_channels::snapshot::{self, ChannelSnapshot};
use rondo_channels::{
    ChannelBindings, ChannelKind, ChannelStatus, MasterBindings, MixerParams, MixerShared,
    SamplePlayerMode, Wave,
};
use rondo_core::{
    ChannelId, Dispatcher, EngineConfig, Event, EventKind, EventSender, Frame, PublishNotice,
    SequencerStatus, Store, SwapKind, SyncSource, SyncState, SyncStatus, ThreadRole,
};
use rondo_midi::MidiSink;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::layout::Layout;
use crate::midi_input::MidiInput;
use crate::renderer::AudioRenderer;
use crate::{EngineBuilder, Error, Result};

/// The loop engine.
///
/// Structural changes (adding channels, loading waves, bindings) apply to
/// the working layout at once and are published with a hard swap. Everything
/// a performer does (key presses, transport, mixer moves) is an event:
/// producers enqueue it and the dispatcher applies it in order. Enqueueing
/// never blocks and returns `false` when the queue is full.
///
/// # Example
///
/// ```ignore
/// use rondo::prelude::*;
///
/// let engine = Engine::builder().sample_rate(48_000).build()?;
/// let id = engine.add_channel(ChannelKind::Sample)?;
/// engine.load_wave(id, Arc::new(wave))?;
///
/// let mut renderer = engine.take_renderer()?;
/// // on the device thread:
/// renderer.render(&input, &mut output, frames, 48_000, true);
///
/// engine.key_press(id, 127);
/// engine.start();
/// ```
pub struct Engine {
    store: Arc<Store<Layout>>,
    dispatcher: Mutex<Dispatcher<Layout>>,
    sender: EventSender,
    config: Arc<ArcSwap<EngineConfig>>,
    mixer: Arc<MixerShared>,
    sync: Arc<SyncState>,
    sink: Arc<dyn MidiSink>,
    renderer: Mutex<Option<AudioRenderer>>,
}

/// Persistent engine state, minus audio data.
///
/// Waves are referenced by name; [`Engine::hydrate`] takes the decoded waves
/// alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub bpm: f32,
    pub beats: u32,
    pub bars: u32,
    pub quantize: u32,
    #[serde(default)]
    pub metronome: bool,
    pub channels: Vec<ChannelSnapshot>,
    #[serde(default)]
    pub master_bindings: MasterBindings,
}

/// Transport state as seen from the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportStatus {
    pub status: SequencerStatus,
    pub bpm: f32,
    pub beats: u32,
    pub bars: u32,
    pub quantize: u32,
    pub current_frame: Frame,
    pub current_beat: u32,
    pub frames_in_loop: Frame,
    pub metronome: bool,
    pub recording_actions: bool,
    pub recording_input: bool,
    pub sync: SyncStatus,
}

/// Peak levels of the last rendered block, per side, linear.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Peaks {
    pub input: (f32, f32),
    pub output: (f32, f32),
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        store: Arc<Store<Layout>>,
        dispatcher: Dispatcher<Layout>,
        config: Arc<ArcSwap<EngineConfig>>,
        mixer: Arc<MixerShared>,
        sync: Arc<SyncState>,
        sink: Arc<dyn MidiSink>,
        renderer: AudioRenderer,
    ) -> Self {
        Self {
            sender: dispatcher.sender(),
            store,
            dispatcher: Mutex::new(dispatcher),
            config,
            mixer,
            sync,
            sink,
            renderer: Mutex::new(Some(renderer)),
        }
    }

    /// Binds the calling thread as MAIN if it has no role yet.
    fn main(&self) -> Result<()> {
        self.store.ensure_registered(ThreadRole::Main)?;
        Ok(())
    }

    /// Applies `f` to the working layout and publishes a hard swap.
    fn edit<R>(&self, f: impl FnOnce(&mut Layout) -> Result<R>) -> Result<R> {
        self.main()?;
        let mut layout = self.store.get_mutable()?;
        let out = f(&mut layout)?;
        layout.publish(SwapKind::Hard)?;
        Ok(out)
    }

    fn read<R>(&self, f: impl FnOnce(&Layout) -> R) -> Result<R> {
        if self.store.thread_role().is_none() {
            self.main()?;
        }
        Ok(self.store.read(f)?)
    }

    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.load_full()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.load().sample_rate
    }

    pub fn store(&self) -> &Arc<Store<Layout>> {
        &self.store
    }

    // --- renderer ---

    /// Hands out the realtime renderer. There is only one.
    pub fn take_renderer(&self) -> Result<AudioRenderer> {
        self.renderer.lock().take().ok_or(Error::RendererTaken)
    }

    /// Gives the renderer back after the device stopped, so another
    /// device thread can take over.
    pub fn return_renderer(&self, renderer: AudioRenderer) {
        self.store.release_audio_thread();
        *self.renderer.lock() = Some(renderer);
    }

    pub fn enable_audio(&self) {
        self.mixer.enable();
    }

    /// Subsequent render calls output silence.
    pub fn disable_audio(&self) {
        self.mixer.disable();
    }

    /// Routes the input straight to the output.
    pub fn set_input_monitor(&self, on: bool) {
        self.mixer.in_to_out.set(on);
    }

    // --- configuration ---

    /// Replaces the runtime configuration.
    ///
    /// Device parameters are fixed for the engine's lifetime; changing one
    /// fails with [`Error::DeviceConfigChanged`].
    pub fn set_config(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        let current = self.config.load();
        if config.sample_rate != current.sample_rate {
            return Err(Error::DeviceConfigChanged("sample_rate"));
        }
        if config.buffer_size != current.buffer_size {
            return Err(Error::DeviceConfigChanged("buffer_size"));
        }
        if config.output_channels != current.output_channels {
            return Err(Error::DeviceConfigChanged("output_channels"));
        }
        if config.input_channels != current.input_channels {
            return Err(Error::DeviceConfigChanged("input_channels"));
        }
        self.edit(|layout| {
            layout.mixer = MixerParams::from_config(&config);
            layout.sequencer.set_count_in(config.count_in_beats);
            Ok(())
        })?;
        self.config.store(Arc::new(config));
        debug!("config updated");
        Ok(())
    }

    // --- channels ---

    /// Adds an empty channel and returns its id.
    pub fn add_channel(&self, kind: ChannelKind) -> Result<ChannelId> {
        if !matches!(kind, ChannelKind::Sample | ChannelKind::Midi) {
            return Err(rondo_channels::Error::WrongKind { id: 0, kind }.into());
        }
        let config = self.config.load();
        self.edit(|layout| {
            let id = layout.next_channel_id();
            let channel = rondo_channels::Channel::new(id, kind, &config, Arc::clone(&self.sink));
            layout.add_channel(channel)?;
            info!(id, ?kind, "channel added");
            Ok(id)
        })
    }

    pub fn remove_channel(&self, id: ChannelId) -> Result<()> {
        self.edit(|layout| {
            match layout.channel(id) {
                None => return Err(Error::ChannelNotFound(id)),
                Some(ch) if ch.is_internal() => return Err(Error::InternalChannel(id)),
                Some(_) => {}
            }
            layout.remove_channel(id);
            info!(id, "channel removed");
            Ok(())
        })
    }

    /// Installs `wave` on a sample channel, resetting its trim.
    pub fn load_wave(&self, id: ChannelId, wave: Arc<Wave>) -> Result<()> {
        self.edit(|layout| {
            let channel = layout.channel_mut(id).ok_or(Error::ChannelNotFound(id))?;
            let kind = channel.kind();
            let sample = channel
                .sample_mut()
                .ok_or(rondo_channels::Error::WrongKind { id, kind })?;
            debug!(id, wave = wave.name(), frames = wave.len(), "wave loaded");
            sample.set_wave(Some(wave));
            Ok(())
        })
    }

    /// Restricts playback of a sample channel to `begin..end`.
    pub fn set_trim(&self, id: ChannelId, begin: Frame, end: Frame) -> Result<()> {
        self.edit(|layout| {
            let channel = layout.channel_mut(id).ok_or(Error::ChannelNotFound(id))?;
            let kind = channel.kind();
            channel
                .sample_mut()
                .ok_or(rondo_channels::Error::WrongKind { id, kind })?
                .set_trim(begin, end)?;
            Ok(())
        })
    }

    pub fn set_mode(&self, id: ChannelId, mode: SamplePlayerMode) -> Result<()> {
        self.edit(|layout| {
            let channel = layout.channel_mut(id).ok_or(Error::ChannelNotFound(id))?;
            let kind = channel.kind();
            channel
                .sample_mut()
                .ok_or(rondo_channels::Error::WrongKind { id, kind })?
                .mode = mode;
            Ok(())
        })
    }

    pub fn set_midi_bindings(&self, id: ChannelId, bindings: ChannelBindings) -> Result<()> {
        self.edit(|layout| {
            let channel = layout.channel_mut(id).ok_or(Error::ChannelNotFound(id))?;
            channel.bindings = bindings;
            Ok(())
        })
    }

    pub fn set_master_bindings(&self, bindings: MasterBindings) -> Result<()> {
        self.edit(|layout| {
            layout.master_bindings = bindings;
            Ok(())
        })
    }

    pub fn channel_ids(&self) -> Result<Vec<ChannelId>> {
        self.read(|layout| layout.channels.iter().map(|ch| ch.id).collect())
    }

    // --- event producers ---

    fn enqueue(&self, event: Event) -> bool {
        let sent = self.sender.enqueue(event);
        if !sent {
            warn!(?event.kind, "event queue full, event dropped");
        }
        sent
    }

    fn channel_event(&self, id: ChannelId, kind: EventKind) -> bool {
        self.enqueue(Event::for_channel(id, kind))
    }

    pub fn key_press(&self, id: ChannelId, velocity: u8) -> bool {
        self.channel_event(id, EventKind::KeyPress { velocity })
    }

    pub fn key_release(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::KeyRelease)
    }

    pub fn key_kill(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::KeyKill)
    }

    pub fn start(&self) -> bool {
        self.enqueue(Event::new(EventKind::SequencerStart))
    }

    pub fn stop(&self) -> bool {
        self.enqueue(Event::new(EventKind::SequencerStop))
    }

    pub fn rewind(&self) -> bool {
        self.enqueue(Event::new(EventKind::SequencerRewind))
    }

    pub fn set_bpm(&self, bpm: f32) -> bool {
        self.enqueue(Event::new(EventKind::SequencerBpm(bpm)))
    }

    pub fn set_beats(&self, beats: u32, bars: u32) -> bool {
        self.enqueue(Event::new(EventKind::SequencerBeats { beats, bars }))
    }

    pub fn go_to_beat(&self, beat: u32) -> bool {
        self.enqueue(Event::new(EventKind::SequencerGoToBeat(beat)))
    }

    /// Grid subdivisions per beat. 0 disables quantization.
    pub fn set_quantize(&self, quantize: u32) -> bool {
        self.enqueue(Event::new(EventKind::SequencerQuantize(quantize)))
    }

    pub fn set_metronome(&self, on: bool) -> bool {
        self.enqueue(Event::new(EventKind::SequencerMetronome(on)))
    }

    pub fn toggle_mute(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::ChannelMute)
    }

    pub fn toggle_solo(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::ChannelSolo)
    }

    pub fn set_volume(&self, id: ChannelId, volume: f32) -> bool {
        self.channel_event(id, EventKind::ChannelVolume(volume))
    }

    pub fn set_pan(&self, id: ChannelId, pan: f32) -> bool {
        self.channel_event(id, EventKind::ChannelPan(pan))
    }

    pub fn set_pitch(&self, id: ChannelId, pitch: f32) -> bool {
        self.channel_event(id, EventKind::ChannelPitch(pitch))
    }

    pub fn toggle_arm(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::ChannelToggleArm)
    }

    pub fn toggle_read_actions(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::ChannelToggleReadActions)
    }

    pub fn kill_read_actions(&self, id: ChannelId) -> bool {
        self.channel_event(id, EventKind::ChannelKillReadActions)
    }

    pub fn start_action_rec(&self) -> bool {
        self.enqueue(Event::new(EventKind::ActionRecStart))
    }

    pub fn stop_action_rec(&self) -> bool {
        self.enqueue(Event::new(EventKind::ActionRecStop))
    }

    /// Starts recording input into armed channels, at once or when the
    /// input first exceeds the trigger level.
    pub fn start_input_rec(&self, on_signal: bool) -> bool {
        self.enqueue(Event::new(EventKind::InputRecStart { signal: on_signal }))
    }

    pub fn stop_input_rec(&self) -> bool {
        self.enqueue(Event::new(EventKind::InputRecStop))
    }

    /// Events lost to a full queue so far.
    pub fn dropped_events(&self) -> u64 {
        self.sender.dropped()
    }

    // --- dispatch ---

    /// A producer handle for other threads.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Applies queued events on the calling thread. Needed when the engine
    /// was built without a dispatcher thread.
    pub fn dispatch_pending(&self) -> Result<usize> {
        if self.store.thread_role().is_none() {
            self.main()?;
        }
        Ok(self.dispatcher.lock().process_pending()?)
    }

    pub fn start_dispatcher(&self) -> Result<()> {
        Ok(self.dispatcher.lock().start()?)
    }

    pub fn stop_dispatcher(&self) {
        self.dispatcher.lock().stop();
    }

    pub fn is_dispatcher_running(&self) -> bool {
        self.dispatcher.lock().is_running()
    }

    /// Notified after every publish.
    pub fn subscribe(&self) -> Receiver<PublishNotice> {
        self.store.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    // --- MIDI and sync ---

    /// A handle for the MIDI driver's input callback.
    pub fn midi_input(&self) -> MidiInput {
        MidiInput::new(Arc::clone(&self.store), self.sender(), Arc::clone(&self.sync))
    }

    /// Where an external transport-sync source reports tempo and position.
    pub fn sync_listener(&self) -> EventSender {
        self.sender()
    }

    pub fn set_sync_source(&self, source: SyncSource) {
        self.sync.set_source(source);
        if source == SyncSource::Internal {
            self.sync.set_status(SyncStatus::Unlocked);
        }
        info!(?source, "sync source changed");
    }

    pub fn sync_state(&self) -> &Arc<SyncState> {
        &self.sync
    }

    // --- persistence ---

    pub fn dehydrate(&self) -> Result<EngineSnapshot> {
        self.read(|layout| {
            let seq = &layout.sequencer;
            EngineSnapshot {
                bpm: seq.bpm(),
                beats: seq.beats(),
                bars: seq.bars(),
                quantize: seq.quantize(),
                metronome: seq.metronome(),
                channels: layout
                    .channels
                    .iter()
                    .map(|ch| snapshot::dehydrate(ch, &layout.actions))
                    .collect(),
                master_bindings: layout.master_bindings.clone(),
            }
        })
    }

    /// Replaces the session with `snapshot`.
    ///
    /// The transport stops and every user channel is rebuilt from OFF.
    /// Waves are looked up by name in `waves`; a channel whose wave is
    /// missing comes back empty.
    pub fn hydrate(
        &self,
        snapshot: &EngineSnapshot,
        waves: &HashMap<String, Arc<Wave>>,
    ) -> Result<()> {
        // Channels stop following the sequencer while the layout is rebuilt.
        self.edit(|layout| {
            layout.sequencer.stop();
            layout.locked = true;
            Ok(())
        })?;

        let config = self.config.load();
        let result = self.edit(|layout| {
            layout.clear_user_channels();
            layout.recording_actions = false;
            layout.recording_input = false;
            layout.sequencer.set_bpm(snapshot.bpm)?;
            layout.sequencer.set_beats(snapshot.beats, snapshot.bars)?;
            layout.sequencer.set_quantize(snapshot.quantize);
            layout.sequencer.set_metronome(snapshot.metronome);
            layout.sequencer.rewind();
            layout.master_bindings = snapshot.master_bindings.clone();

            for ch in &snapshot.channels {
                if let Some(existing) = layout.channel_mut(ch.id).filter(|c| c.is_internal()) {
                    existing.volume = ch.volume;
                    existing.pan = ch.pan;
                    continue;
                }
                let wave = ch
                    .sample
                    .as_ref()
                    .and_then(|s| s.wave.as_ref())
                    .and_then(|name| {
                        let found = waves.get(name).cloned();
                        if found.is_none() {
                            warn!(id = ch.id, wave = %name, "wave missing, channel left empty");
                        }
                        found
                    });
                let channel = snapshot::hydrate(ch, &config, Arc::clone(&self.sink), wave)?;
                layout.add_channel(channel)?;
                layout.actions.import(ch.actions.iter().copied());
            }
            Ok(())
        });

        self.edit(|layout| {
            layout.locked = false;
            Ok(())
        })?;
        result?;
        info!(channels = snapshot.channels.len(), "session loaded");
        Ok(())
    }

    // --- queries ---

    pub fn channel_status(&self, id: ChannelId) -> Result<ChannelStatus> {
        self.read(|layout| layout.channel(id).map(|ch| ch.status()))?
            .ok_or(Error::ChannelNotFound(id))
    }

    /// Play head of a sample channel, in fractional frames into its wave.
    pub fn channel_position(&self, id: ChannelId) -> Result<f64> {
        self.read(|layout| layout.channel(id).map(|ch| ch.shared.position.get()))?
            .ok_or(Error::ChannelNotFound(id))
    }

    pub fn transport_status(&self) -> Result<TransportStatus> {
        let sync = self.sync.status();
        self.read(|layout| {
            let seq = &layout.sequencer;
            TransportStatus {
                status: seq.status(),
                bpm: seq.bpm(),
                beats: seq.beats(),
                bars: seq.bars(),
                quantize: seq.quantize(),
                current_frame: seq.current_frame(),
                current_beat: seq.current_beat(),
                frames_in_loop: seq.frames_in_loop(),
                metronome: seq.metronome(),
                recording_actions: layout.recording_actions,
                recording_input: layout.recording_input,
                sync,
            }
        })
    }

    pub fn peaks(&self) -> Peaks {
        Peaks {
            input: self.mixer.peak_in.get(),
            output: self.mixer.peak_out.get(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("generation", &self.store.generation())
            .field("sample_rate", &self.sample_rate())
            .finish_non_exhaustive()
    }
}
