//! MIDI input, clock sync and clock output

use std::thread;

use approx::assert_relative_eq;
use rondo::channels::ChannelBindings;
use rondo::midi::ClockMessage;
use rondo::prelude::*;
use rondo::{OutboundMidi, QueueSink, SyncSource, SyncStatus};

use crate::helpers::tolerances::BPM_EPSILON;
use crate::helpers::*;

/// Feeds `messages` from a thread of its own, as a MIDI driver would.
fn from_midi_thread(engine: &Engine, messages: Vec<(Vec<u8>, f64)>) -> usize {
    let mut input = engine.midi_input();
    thread::spawn(move || {
        messages
            .iter()
            .map(|(bytes, at)| input.receive(bytes, *at).expect("valid message"))
            .sum()
    })
    .join()
    .expect("midi thread panicked")
}

#[test]
fn test_bound_note_presses_the_channel() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 500, 0.5));
    engine
        .set_midi_bindings(
            id,
            ChannelBindings {
                enabled: true,
                key_press: Some(MidiEvent::note_on(0, 36, 0).raw_no_velocity()),
                ..ChannelBindings::default()
            },
        )
        .unwrap();

    // Broadcast plus the key press.
    assert_eq!(from_midi_thread(&engine, vec![(vec![0x90, 36, 100], 0.0)]), 2);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);

    dispatch(&engine);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);
}

#[test]
fn test_unbound_note_is_only_broadcast() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 500, 0.5));

    assert_eq!(from_midi_thread(&engine, vec![(vec![0x90, 36, 100], 0.0)]), 1);
    dispatch(&engine);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
}

#[test]
fn test_follows_external_clock() {
    let engine = test_engine();
    engine.set_sync_source(SyncSource::MidiClock);

    // Start, then one quarter note of pulses at 90 bpm.
    let quarter = 60.0 / 90.0;
    let mut messages = vec![(vec![0xFA], 0.0)];
    messages.extend((1..=24).map(|pulse| (vec![0xF8], pulse as f64 * quarter / 24.0)));
    assert_eq!(from_midi_thread(&engine, messages), 2);

    dispatch(&engine);
    let status = engine.transport_status().unwrap();
    assert_eq!(status.status, SequencerStatus::Running);
    assert_relative_eq!(status.bpm, 90.0, epsilon = BPM_EPSILON);
    assert_eq!(status.sync, SyncStatus::Locked);

    from_midi_thread(&engine, vec![(vec![0xFC], 1.0)]);
    dispatch(&engine);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Stopped
    );
}

#[test]
fn test_clock_is_ignored_on_internal_sync() {
    let engine = test_engine();
    assert_eq!(from_midi_thread(&engine, vec![(vec![0xFA], 0.0)]), 0);
    dispatch(&engine);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Stopped
    );
}

#[test]
fn test_sends_clock_while_running() {
    init_tracing();
    let (sink, rx) = QueueSink::new(256);
    let engine = Engine::builder()
        .config(test_config())
        .midi_sink(Arc::new(sink))
        .midi_clock_out(true)
        .dispatcher_thread(false)
        .build()
        .unwrap();
    let audio = AudioThread::for_engine(&engine);

    audio.run(1_000, TEST_BUFFER_SIZE);
    assert!(rx.try_recv().is_err());

    engine.start();
    dispatch(&engine);
    // 24 pulses per second at 60 bpm: one every 333 frames.
    audio.run(1_000, TEST_BUFFER_SIZE);
    let sent: Vec<OutboundMidi> = rx.try_iter().collect();
    assert_eq!(sent[0], OutboundMidi::Clock(ClockMessage::Start));
    let ticks = sent
        .iter()
        .filter(|m| **m == OutboundMidi::Clock(ClockMessage::Tick))
        .count();
    assert!((2..=4).contains(&ticks), "{ticks} ticks");

    engine.stop();
    dispatch(&engine);
    audio.render(TEST_BUFFER_SIZE);
    let sent: Vec<OutboundMidi> = rx.try_iter().collect();
    assert_eq!(sent.last(), Some(&OutboundMidi::Clock(ClockMessage::Stop)));
}
