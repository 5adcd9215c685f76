//! Channel playback and mixing through the whole engine

use rondo::prelude::*;

use crate::helpers::tolerances::{FLOAT_EPSILON, SILENCE_THRESHOLD};
use crate::helpers::*;

/// A grid line every 4 frames: 8000 frames per beat, 2000 subdivisions.
fn grid_engine() -> Engine {
    test_engine_with(EngineConfig {
        quantize: 2_000,
        ..test_config()
    })
}

#[test]
fn test_quantized_loop_press_starts_on_the_grid() {
    let engine = grid_engine();
    let id = sample_channel(&engine, SamplePlayerMode::LoopBasic, constant_wave("loop", 1000, 0.5));
    engine.start();
    dispatch(&engine);
    let audio = AudioThread::for_engine(&engine);

    audio.render(2);
    engine.key_press(id, 127);
    dispatch(&engine);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);

    // Frames 2..6: the grid line at frame 4 is local frame 2.
    let out = left(&audio.render(4));
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[1], 0.0);
    assert!((out[2] - 0.5).abs() < FLOAT_EPSILON);
    assert!((out[3] - 0.5).abs() < FLOAT_EPSILON);
}

#[test]
fn test_release_before_the_grid_cancels_the_start() {
    let engine = grid_engine();
    let id = sample_channel(&engine, SamplePlayerMode::LoopBasic, constant_wave("loop", 1000, 0.5));
    engine.start();
    dispatch(&engine);
    let audio = AudioThread::for_engine(&engine);

    audio.render(1);
    engine.key_press(id, 127);
    engine.key_kill(id);
    dispatch(&engine);

    let out = audio.render(8);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
    assert_silence(&out, 0.0);
}

#[test]
fn test_single_basic_press_while_playing_stops_at_the_end_of_the_wave() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 1000, 0.5));
    let audio = AudioThread::for_engine(&engine);

    engine.key_press(id, 127);
    dispatch(&engine);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!(out.iter().all(|s| (*s - 0.5).abs() < FLOAT_EPSILON));

    // The second press lets the wave finish.
    engine.key_press(id, 127);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);
    assert!(out.iter().all(|s| (*s - 0.5).abs() < FLOAT_EPSILON));

    // Frames 128..1000 are the rest of the wave.
    let out = audio.run(1000 - 2 * TEST_BUFFER_SIZE, TEST_BUFFER_SIZE);
    assert!(out.iter().all(|s| (*s - 0.5).abs() < FLOAT_EPSILON));
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);

    let out = audio.render(TEST_BUFFER_SIZE);
    assert_silence(&out, 0.0);
}

#[test]
fn test_one_shot_turns_off_at_the_end_of_its_wave() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 100, 0.5));
    let audio = AudioThread::for_engine(&engine);

    engine.key_press(id, 127);
    dispatch(&engine);
    audio.render(64);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);

    let out = left(&audio.render(64));
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
    assert!((out[35] - 0.5).abs() < FLOAT_EPSILON);
    assert_silence(&out[36..], SILENCE_THRESHOLD);
}

#[test]
fn test_centered_unity_channel_is_passed_through() {
    let engine = test_engine();
    let samples: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0) - 0.5).collect();
    let wave = Arc::new(
        Wave::from_interleaved(&samples, 1, TEST_SAMPLE_RATE)
            .unwrap()
            .with_name("ramp"),
    );
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, wave);
    let audio = AudioThread::for_engine(&engine);

    engine.key_press(id, 127);
    dispatch(&engine);
    let out = audio.run(256, TEST_BUFFER_SIZE);
    for (frame, expected) in samples.iter().enumerate() {
        assert!((out[frame * 2] - expected).abs() < FLOAT_EPSILON);
        assert!((out[frame * 2 + 1] - expected).abs() < FLOAT_EPSILON);
    }
}

#[test]
fn test_mute_solo_and_pan() {
    let engine = test_engine();
    let a = sample_channel(&engine, SamplePlayerMode::SingleEndless, constant_wave("a", 64, 0.25));
    let b = sample_channel(&engine, SamplePlayerMode::SingleEndless, constant_wave("b", 64, 0.5));
    let audio = AudioThread::for_engine(&engine);

    engine.key_press(a, 127);
    engine.key_press(b, 127);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!((out[0] - 0.75).abs() < FLOAT_EPSILON);

    engine.toggle_mute(b);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!((out[0] - 0.25).abs() < FLOAT_EPSILON);

    // Soloing b silences a.
    engine.toggle_mute(b);
    engine.toggle_solo(b);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!((out[0] - 0.5).abs() < FLOAT_EPSILON);

    // Linear pan law: hard left keeps the left side at full level.
    engine.set_pan(b, 0.0);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!((out[0] - 0.5).abs() < FLOAT_EPSILON);
    assert!(out[1].abs() < FLOAT_EPSILON);
}

#[test]
fn test_master_out_volume_scales_everything() {
    let engine = test_engine();
    let id = sample_channel(&engine, SamplePlayerMode::SingleBasic, constant_wave("hit", 1000, 0.5));
    let audio = AudioThread::for_engine(&engine);

    engine.set_volume(rondo::channels::MASTER_OUT_ID, 0.5);
    engine.key_press(id, 127);
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert!((out[0] - 0.25).abs() < FLOAT_EPSILON);
}

#[test]
fn test_loop_stops_with_the_sequencer() {
    let engine = test_engine_with(EngineConfig {
        chans_stop_on_seq_halt: true,
        ..test_config()
    });
    let id = sample_channel(&engine, SamplePlayerMode::LoopBasic, constant_wave("loop", 1000, 0.5));
    let audio = AudioThread::for_engine(&engine);

    // No grid: the press waits for the first beat.
    engine.key_press(id, 127);
    dispatch(&engine);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Wait);

    engine.start();
    dispatch(&engine);
    let out = audio.render(TEST_BUFFER_SIZE);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Play);
    assert!((out[0] - 0.5).abs() < FLOAT_EPSILON);

    engine.stop();
    dispatch(&engine);
    audio.render(TEST_BUFFER_SIZE);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
}
