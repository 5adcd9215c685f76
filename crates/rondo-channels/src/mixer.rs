//! Final render graph: channels into the master bus.
//!
//! [`MixerShared`] is the part other threads may touch (flags, meters, the
//! input record buffer). [`Mixer`] belongs to the audio thread and owns the
//! scratch buffers every channel renders into.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rondo_core::{
    to_dbfs, AtomicFlag, AudioBuffer, EngineConfig, Event, EventKind, EventSender, Frame, Pan,
    PeakMeter,
};

use crate::channel::{Channel, ChannelKind, RenderContext};

/// Receives the mixer's one-shot notifications. Called from the audio thread,
/// so implementations must not block.
pub trait MixerListener: Send + Sync {
    fn on_signal_threshold(&self);
    fn on_end_of_recording(&self);
}

impl MixerListener for EventSender {
    fn on_signal_threshold(&self) {
        self.enqueue(Event::new(EventKind::MixerSignalThreshold));
    }

    fn on_end_of_recording(&self) {
        self.enqueue(Event::new(EventKind::MixerEndOfRecording));
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl MixerListener for NullListener {
    fn on_signal_threshold(&self) {}
    fn on_end_of_recording(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerParams {
    /// dBFS.
    pub rec_trigger_level: f32,
    pub limit_output: bool,
}

impl MixerParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            rec_trigger_level: config.rec_trigger_level,
            limit_output: config.limit_output,
        }
    }
}

impl Default for MixerParams {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[derive(Debug)]
pub struct MixerShared {
    active: AtomicFlag,
    pub in_to_out: AtomicFlag,
    wait_for_signal: AtomicFlag,
    recording_input: AtomicFlag,
    end_of_recording: AtomicFlag,
    rec_buffer: Mutex<AudioBuffer>,
    rec_frames: AtomicU64,
    pub peak_in: PeakMeter,
    pub peak_out: PeakMeter,
}

impl MixerShared {
    pub fn new() -> Self {
        Self {
            active: AtomicFlag::new(true),
            in_to_out: AtomicFlag::new(false),
            wait_for_signal: AtomicFlag::new(false),
            recording_input: AtomicFlag::new(false),
            end_of_recording: AtomicFlag::new(false),
            rec_buffer: Mutex::new(AudioBuffer::default()),
            rec_frames: AtomicU64::new(0),
            peak_in: PeakMeter::new(),
            peak_out: PeakMeter::new(),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn enable(&self) {
        self.active.set(true);
    }

    pub fn disable(&self) {
        self.active.set(false);
    }

    #[inline]
    pub fn is_waiting_for_signal(&self) -> bool {
        self.wait_for_signal.get()
    }

    #[inline]
    pub fn is_recording_input(&self) -> bool {
        self.recording_input.get()
    }

    /// Arms the input trigger. The next buffer louder than the trigger level
    /// raises [`MixerListener::on_signal_threshold`] once.
    pub fn wait_for_signal(&self) {
        self.wait_for_signal.set(true);
    }

    /// Allocates a record buffer of `max_frames` and starts writing input into it.
    pub fn start_input_rec(&self, max_frames: Frame, channels: usize) {
        let buffer = AudioBuffer::new(max_frames as usize, channels.max(1));
        *self.rec_buffer.lock() = buffer;
        self.rec_frames.store(0, Ordering::Release);
        self.end_of_recording.set(false);
        self.wait_for_signal.set(false);
        self.recording_input.set(true);
        tracing::debug!(max_frames, "input recording started");
    }

    /// Stops recording and hands back what was captured.
    pub fn stop_input_rec(&self) -> AudioBuffer {
        self.recording_input.set(false);
        self.wait_for_signal.set(false);
        let captured = std::mem::take(&mut *self.rec_buffer.lock());
        let frames = self.rec_frames.swap(0, Ordering::AcqRel) as usize;
        let mut out = AudioBuffer::new(frames, captured.channels().max(1));
        out.set_from(&captured, frames, 1.0);
        tracing::debug!(frames, "input recording stopped");
        out
    }

    pub fn recorded_frames(&self) -> Frame {
        self.rec_frames.load(Ordering::Acquire)
    }

    /// Audio thread. Appends `frames` of `input` to the record buffer.
    fn record(&self, input: &AudioBuffer, frames: usize) -> bool {
        let Some(mut buffer) = self.rec_buffer.try_lock() else {
            return false;
        };
        let capacity = buffer.frames();
        let start = self.rec_frames.load(Ordering::Acquire) as usize;
        let count = frames.min(capacity.saturating_sub(start));
        for frame in 0..count {
            for ch in 0..buffer.channels() {
                let src_ch = ch.min(input.channels().saturating_sub(1));
                buffer.set(start + frame, ch, input.get(frame, src_ch));
            }
        }
        let total = start + count;
        self.rec_frames.store(total as u64, Ordering::Release);
        total >= capacity
    }
}

impl Default for MixerShared {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Mixer {
    shared: Arc<MixerShared>,
    listener: Arc<dyn MixerListener>,
    input: AudioBuffer,
    scratch: AudioBuffer,
}

impl Mixer {
    pub fn new(
        shared: Arc<MixerShared>,
        listener: Arc<dyn MixerListener>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            shared,
            listener,
            input: AudioBuffer::new(config.buffer_size, config.output_channels),
            scratch: AudioBuffer::new(config.buffer_size, config.output_channels),
        }
    }

    pub fn shared(&self) -> &Arc<MixerShared> {
        &self.shared
    }

    /// Reallocates the scratch buffers. Never call from the audio thread.
    pub fn reset(&mut self, config: &EngineConfig) {
        self.input = AudioBuffer::new(config.buffer_size, config.output_channels);
        self.scratch = AudioBuffer::new(config.buffer_size, config.output_channels);
    }

    /// Renders every audible channel into `out`, which the caller cleared.
    ///
    /// `raw_input` is the device's interleaved input block, `input_channels` wide.
    /// Audio thread.
    pub fn render(
        &mut self,
        channels: &[Channel],
        raw_input: &[f32],
        input_channels: usize,
        out: &mut AudioBuffer,
        frames: usize,
        sequencer_running: bool,
        params: &MixerParams,
    ) {
        let frames = frames.min(self.scratch.frames()).min(out.frames());
        let master_in = master_gain(channels, ChannelKind::MasterIn);
        let master_out = master_gain(channels, ChannelKind::MasterOut);

        self.input
            .read_interleaved(raw_input, input_channels, frames, master_in);
        self.process_input(frames, params);

        let any_soloed = channels.iter().any(|ch| !ch.is_internal() && ch.is_soloed());
        let ctx = RenderContext {
            input: &self.input,
            frames,
            sequencer_running,
        };
        for channel in channels {
            if matches!(channel.kind(), ChannelKind::MasterIn | ChannelKind::MasterOut) {
                continue;
            }
            self.scratch.clear();
            channel.render(&mut self.scratch, &ctx);
            if channel.is_audible(any_soloed) {
                out.sum(&self.scratch, frames, channel.gain(), channel.pan_law());
            }
        }

        if self.shared.in_to_out.get() {
            out.sum(&self.input, frames, 1.0, Pan::CENTER);
        }
        if master_out != 1.0 {
            out.apply_gain(master_out);
        }
        if params.limit_output {
            out.limit();
        }
        self.shared.peak_out.update(out, frames);
    }

    fn process_input(&self, frames: usize, params: &MixerParams) {
        let shared = &self.shared;
        shared.peak_in.update(&self.input, frames);

        if shared.is_waiting_for_signal()
            && to_dbfs(self.input.peak(frames)) > params.rec_trigger_level
            && shared.wait_for_signal.take()
        {
            self.listener.on_signal_threshold();
        }

        if shared.is_recording_input()
            && shared.record(&self.input, frames)
            && !shared.end_of_recording.get()
        {
            shared.end_of_recording.set(true);
            self.listener.on_end_of_recording();
        }
    }
}

fn master_gain(channels: &[Channel], kind: ChannelKind) -> f32 {
    channels
        .iter()
        .find(|ch| ch.kind() == kind)
        .map_or(1.0, |ch| ch.volume)
}
