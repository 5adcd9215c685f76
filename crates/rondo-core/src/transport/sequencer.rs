//! Loop transport: tempo, loop length, frame counter and boundary events.
//!
//! Musical parameters are plain fields, cloned with every published layout.
//! Status and position live in a [`TransportState`] shared by all clones,
//! so the audio thread can move the play head and the dispatcher can start
//! or stop the transport without waiting for a publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arrayvec::ArrayVec;
use tracing::debug;

use super::fsm::{SequencerStatus, StatusCell, TransportEvent};
use super::quantizer::Quantizer;
use crate::actions::ActionRecorder;
use crate::config::{validate_beats, validate_bpm, EngineConfig, MAX_BEATS, MIN_BPM};
use crate::{AtomicFlag, Frame, Result};

/// Events one `advance` can report. Extra events in a pathological buffer
/// are dropped.
pub const EVENT_BUFFER_CAPACITY: usize = 1024;

const NO_FRAME: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEventKind {
    /// The loop (re)starts at frame 0.
    FirstBeat,
    Bar(u32),
    Beat(u32),
    Rewind,
    /// Recorded actions exist at `global_frame`.
    Actions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerEvent {
    pub kind: SequencerEventKind,
    pub global_frame: Frame,
    /// Offset inside the current buffer.
    pub delta: Frame,
}

pub type EventBuffer = ArrayVec<SequencerEvent, EVENT_BUFFER_CAPACITY>;

#[derive(Debug)]
struct TransportState {
    status: StatusCell,
    current_frame: AtomicU64,
    /// A jump requested off the audio thread, applied at the next buffer.
    pending_frame: AtomicU64,
    count_in_remaining: AtomicU64,
    /// Quantized rewind waiting for the next grid line.
    rewind_armed: AtomicFlag,
    /// Immediate rewind to announce at the next buffer.
    rewind_now: AtomicFlag,
}

impl TransportState {
    fn new() -> Self {
        Self {
            status: StatusCell::default(),
            current_frame: AtomicU64::new(0),
            pending_frame: AtomicU64::new(NO_FRAME),
            count_in_remaining: AtomicU64::new(0),
            rewind_armed: AtomicFlag::new(false),
            rewind_now: AtomicFlag::new(false),
        }
    }

    fn take_pending_frame(&self) -> Option<Frame> {
        match self.pending_frame.swap(NO_FRAME, Ordering::AcqRel) {
            NO_FRAME => None,
            frame => Some(frame),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    sample_rate: u32,
    bpm: f32,
    beats: u32,
    bars: u32,
    quantize: u32,
    count_in_beats: u32,
    metronome: bool,
    frames_in_beat: Frame,
    frames_in_bar: Frame,
    frames_in_loop: Frame,
    shared: Arc<TransportState>,
    pub quantizer: Quantizer,
}

impl Sequencer {
    pub fn new(config: &EngineConfig) -> Self {
        let mut seq = Self {
            sample_rate: config.sample_rate,
            bpm: config.bpm,
            beats: config.beats,
            bars: config.bars,
            quantize: config.quantize,
            count_in_beats: config.count_in_beats,
            metronome: false,
            frames_in_beat: 0,
            frames_in_bar: 0,
            frames_in_loop: 0,
            shared: Arc::new(TransportState::new()),
            quantizer: Quantizer::new(),
        };
        seq.recompute();
        seq
    }

    /// Stops the transport and reloads tempo and grid from `config`.
    pub fn reset(&mut self, config: &EngineConfig) {
        self.stop();
        self.sample_rate = config.sample_rate;
        self.bpm = config.bpm;
        self.beats = config.beats;
        self.bars = config.bars;
        self.quantize = config.quantize;
        self.count_in_beats = config.count_in_beats;
        self.recompute();
        self.shared.current_frame.store(0, Ordering::Release);
        self.shared.pending_frame.store(NO_FRAME, Ordering::Release);
    }

    fn recompute(&mut self) {
        self.frames_in_beat = (f64::from(self.sample_rate) * 60.0 / f64::from(self.bpm)) as Frame;
        self.frames_in_loop = self.frames_in_beat * Frame::from(self.beats);
        self.frames_in_bar = self.frames_in_loop / Frame::from(self.bars.max(1));
        let step = if self.quantize > 0 {
            self.frames_in_beat / Frame::from(self.quantize)
        } else {
            0
        };
        self.quantizer.set_step(step);
    }

    // --- transport control (non-realtime) ---

    pub fn start(&self) -> Option<SequencerStatus> {
        let count_in = self.count_in_beats > 0;
        self.shared.count_in_remaining.store(
            Frame::from(self.count_in_beats) * self.frames_in_beat,
            Ordering::Release,
        );
        let changed = self.shared.status.apply(TransportEvent::Start { count_in });
        if let Some(status) = changed {
            debug!(?status, "sequencer started");
        }
        changed
    }

    /// Waits, without counting in, until [`Sequencer::on_signal`].
    pub fn start_on_signal(&self) -> Option<SequencerStatus> {
        self.shared.count_in_remaining.store(0, Ordering::Release);
        self.shared.status.apply(TransportEvent::StartOnSignal)
    }

    /// The input trigger fired while waiting.
    pub fn on_signal(&self) -> Option<SequencerStatus> {
        self.shared.status.apply(TransportEvent::Signal)
    }

    /// Stops the transport and cancels every armed quantized action.
    pub fn stop(&self) -> Option<SequencerStatus> {
        let changed = self.shared.status.apply(TransportEvent::Stop);
        self.shared.count_in_remaining.store(0, Ordering::Release);
        self.shared.rewind_armed.set(false);
        self.quantizer.clear();
        if changed.is_some() {
            debug!("sequencer stopped");
        }
        changed
    }

    /// Rewinds at the next grid line if possible, otherwise at the next buffer.
    pub fn rewind(&self) {
        if self.can_quantize() {
            self.shared.rewind_armed.set(true);
            return;
        }
        self.shared.pending_frame.store(0, Ordering::Release);
        if self.is_running() {
            self.shared.rewind_now.set(true);
        }
    }

    pub fn go_to_beat(&self, beat: u32) {
        let frame = (Frame::from(beat) * self.frames_in_beat)
            .min(self.frames_in_loop.saturating_sub(1));
        self.shared.pending_frame.store(frame, Ordering::Release);
    }

    /// Changes tempo and returns old bpm / new bpm, the factor recorded
    /// action frames must be scaled by.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<f32> {
        validate_bpm(bpm)?;
        let ratio = self.bpm / bpm;
        let frame = self.current_frame();
        self.bpm = bpm;
        self.recompute();
        let moved = ((frame as f64 * f64::from(ratio)) as Frame)
            .min(self.frames_in_loop.saturating_sub(1));
        self.shared.pending_frame.store(moved, Ordering::Release);
        debug!(bpm, "tempo changed");
        Ok(ratio)
    }

    pub fn set_beats(&mut self, beats: u32, bars: u32) -> Result<()> {
        validate_beats(beats, bars)?;
        self.beats = beats;
        self.bars = bars;
        self.recompute();
        if self.current_frame() >= self.frames_in_loop {
            self.shared.pending_frame.store(0, Ordering::Release);
        }
        Ok(())
    }

    /// Grid subdivisions per beat; 0 disables quantization.
    pub fn set_quantize(&mut self, quantize: u32) {
        self.quantize = quantize;
        self.recompute();
    }

    pub fn set_metronome(&mut self, on: bool) {
        self.metronome = on;
    }

    pub fn set_count_in(&mut self, beats: u32) {
        self.count_in_beats = beats;
    }

    // --- queries ---

    #[inline]
    pub fn status(&self) -> SequencerStatus {
        self.shared.status.load()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status() == SequencerStatus::Running
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status() != SequencerStatus::Stopped
    }

    #[inline]
    pub fn can_quantize(&self) -> bool {
        self.quantizer.can_quantize(self.is_running())
    }

    /// Play head, including a jump not yet picked up by the audio thread.
    pub fn current_frame(&self) -> Frame {
        match self.shared.pending_frame.load(Ordering::Acquire) {
            NO_FRAME => self.shared.current_frame.load(Ordering::Acquire),
            frame => frame,
        }
    }

    /// Play head rounded up to the next grid line while quantizing.
    pub fn current_frame_quantized(&self) -> Frame {
        let frame = self.current_frame();
        let step = self.quantizer.step();
        if !self.can_quantize() || frame % step == 0 {
            return frame;
        }
        let snapped = frame.div_ceil(step) * step;
        if snapped >= self.frames_in_loop {
            0
        } else {
            snapped
        }
    }

    pub fn current_beat(&self) -> u32 {
        (self.current_frame() / self.frames_in_beat.max(1)) as u32
    }

    pub fn current_bar(&self) -> u32 {
        (self.current_frame() / self.frames_in_bar.max(1)) as u32
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn quantize(&self) -> u32 {
        self.quantize
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn metronome(&self) -> bool {
        self.metronome
    }

    pub fn frames_in_beat(&self) -> Frame {
        self.frames_in_beat
    }

    pub fn frames_in_bar(&self) -> Frame {
        self.frames_in_bar
    }

    pub fn frames_in_loop(&self) -> Frame {
        self.frames_in_loop
    }

    pub fn quantizer_step(&self) -> Frame {
        self.quantizer.step()
    }

    /// Longest loop the engine allows: every beat at the slowest tempo.
    pub fn max_frames_in_loop(&self) -> Frame {
        (f64::from(self.sample_rate) * 60.0 / f64::from(MIN_BPM)) as Frame * Frame::from(MAX_BEATS)
    }

    // --- audio thread ---

    /// Moves the play head by `frames` and reports what it crossed.
    ///
    /// Fires armed quantizer slots at grid lines, finishes the count-in at
    /// the exact frame it runs out, and wraps at the loop end.
    pub fn advance(&self, frames: usize, actions: &ActionRecorder, out: &mut EventBuffer) {
        out.clear();
        let shared = &*self.shared;
        let mut frame = shared.current_frame.load(Ordering::Acquire);
        if let Some(jump) = shared.take_pending_frame() {
            frame = jump;
        }
        if self.frames_in_loop == 0 {
            return;
        }
        let mut status = shared.status.load();
        if status == SequencerStatus::Running && shared.rewind_now.take() {
            frame = 0;
            push(out, SequencerEventKind::Rewind, 0, 0);
        }
        let step = self.quantizer.step();

        for local in 0..frames as Frame {
            match status {
                SequencerStatus::Stopped => break,
                SequencerStatus::Waiting => {
                    self.count_in(local, out, &mut status);
                    continue;
                }
                SequencerStatus::Running => {}
            }

            if frame >= self.frames_in_loop {
                frame = 0;
            }
            let on_grid = step > 0 && frame % step == 0;
            if on_grid && shared.rewind_armed.take() {
                frame = 0;
                push(out, SequencerEventKind::Rewind, frame, local);
            }

            if frame == 0 {
                push(out, SequencerEventKind::FirstBeat, frame, local);
            } else if frame % self.frames_in_bar == 0 {
                let bar = (frame / self.frames_in_bar) as u32;
                push(out, SequencerEventKind::Bar(bar), frame, local);
            }
            if frame % self.frames_in_beat == 0 {
                let beat = (frame / self.frames_in_beat) as u32;
                push(out, SequencerEventKind::Beat(beat), frame, local);
            }
            if actions.has_actions_at(frame) {
                push(out, SequencerEventKind::Actions, frame, local);
            }
            if on_grid {
                self.quantizer.fire(local);
            }
            frame += 1;
        }

        if frame >= self.frames_in_loop {
            frame = 0;
        }
        shared.current_frame.store(frame, Ordering::Release);
    }

    fn count_in(&self, local: Frame, out: &mut EventBuffer, status: &mut SequencerStatus) {
        let shared = &*self.shared;
        let remaining = shared.count_in_remaining.load(Ordering::Acquire);
        if remaining == 0 {
            // Armed for an input signal.
            return;
        }
        let total = Frame::from(self.count_in_beats) * self.frames_in_beat;
        let counted = total.saturating_sub(remaining);
        if counted % self.frames_in_beat == 0 {
            let beat = (counted / self.frames_in_beat) as u32;
            push(out, SequencerEventKind::Beat(beat), counted, local);
        }
        shared.count_in_remaining.store(remaining - 1, Ordering::Release);
        if remaining == 1 {
            *status = shared
                .status
                .apply(TransportEvent::CountInDone)
                .unwrap_or_else(|| shared.status.load());
        }
    }
}

#[inline]
fn push(out: &mut EventBuffer, kind: SequencerEventKind, global_frame: Frame, delta: Frame) {
    let _ = out.try_push(SequencerEvent {
        kind,
        global_frame,
        delta,
    });
}
