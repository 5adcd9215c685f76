//! Engine lifecycle and device contract tests

use rondo::prelude::*;
use rondo::Error;

use crate::helpers::tolerances::FLOAT_EPSILON;
use crate::helpers::*;

#[test]
fn test_engine_starts_with_internal_channels() {
    let engine = test_engine();
    assert_eq!(engine.channel_ids().unwrap(), vec![1, 2, 3]);

    let id = engine.add_channel(ChannelKind::Sample).unwrap();
    assert_eq!(id, 4);
    assert_eq!(engine.channel_status(id).unwrap(), ChannelStatus::Off);
}

#[test]
fn test_renderer_can_be_taken_once() {
    let engine = test_engine();
    let renderer = engine.take_renderer().unwrap();
    assert!(matches!(engine.take_renderer(), Err(Error::RendererTaken)));

    engine.return_renderer(renderer);
    assert!(engine.take_renderer().is_ok());
}

#[test]
fn test_internal_channels_cannot_be_removed() {
    let engine = test_engine();
    assert!(matches!(engine.remove_channel(1), Err(Error::InternalChannel(1))));
    assert!(matches!(engine.remove_channel(99), Err(Error::ChannelNotFound(99))));

    let id = engine.add_channel(ChannelKind::Midi).unwrap();
    engine.remove_channel(id).unwrap();
    assert!(matches!(engine.channel_status(id), Err(Error::ChannelNotFound(_))));
}

#[test]
fn test_removed_channel_id_is_not_handed_out_again() {
    let engine = test_engine();
    let first = engine.add_channel(ChannelKind::Sample).unwrap();
    let last = engine.add_channel(ChannelKind::Sample).unwrap();
    engine.remove_channel(last).unwrap();

    let next = engine.add_channel(ChannelKind::Sample).unwrap();
    assert_eq!((first, last, next), (4, 5, 6));
    assert_eq!(engine.channel_ids().unwrap(), vec![1, 2, 3, 4, 6]);
}

#[test]
fn test_wave_needs_a_sample_channel() {
    let engine = test_engine();
    let id = engine.add_channel(ChannelKind::Midi).unwrap();
    let result = engine.load_wave(id, constant_wave("kick", 100, 0.5));
    assert!(matches!(result, Err(Error::Channels(_))));
}

#[test]
fn test_device_not_ready_gets_silence() {
    let engine = test_engine();
    engine.set_input_monitor(true);
    let audio = AudioThread::for_engine(&engine);

    let out = audio.render_not_ready(TEST_BUFFER_SIZE);
    assert_eq!(out.len(), TEST_BUFFER_SIZE * 2);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn test_disabled_audio_renders_silence() {
    let engine = test_engine();
    engine.set_input_monitor(true);
    let audio = AudioThread::for_engine(&engine);

    engine.disable_audio();
    let out = audio.render_input(vec![0.25; 128], 64);
    assert!(out.iter().all(|s| *s == 0.0));

    engine.enable_audio();
    let out = audio.render_input(vec![0.25; 128], 64);
    assert!(out.iter().all(|s| (*s - 0.25).abs() < FLOAT_EPSILON));
}

#[test]
fn test_peaks_follow_the_output() {
    let engine = test_engine();
    engine.set_input_monitor(true);
    let audio = AudioThread::for_engine(&engine);

    audio.render_input(vec![0.5; 128], 64);
    let peaks = engine.peaks();
    assert!((peaks.input.0 - 0.5).abs() < FLOAT_EPSILON);
    assert!((peaks.output.1 - 0.5).abs() < FLOAT_EPSILON);
}

#[test]
fn test_set_config_keeps_device_parameters() {
    let engine = test_engine();

    let mut changed = test_config();
    changed.sample_rate = 44_100;
    assert!(matches!(
        engine.set_config(changed),
        Err(Error::DeviceConfigChanged("sample_rate"))
    ));

    let mut changed = test_config();
    changed.limit_output = true;
    changed.count_in_beats = 2;
    engine.set_config(changed).unwrap();
    assert!(engine.config().limit_output);
    assert!(engine.store().read(|l| l.mixer.limit_output).unwrap());
}

#[test]
fn test_invalid_config_is_rejected_at_build() {
    let config = EngineConfig {
        buffer_size: 0,
        ..test_config()
    };
    let result = Engine::builder().config(config).dispatcher_thread(false).build();
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn test_dispatcher_thread_applies_events() {
    init_tracing();
    let engine = Engine::builder().config(test_config()).build().unwrap();
    assert!(engine.is_dispatcher_running());
    let notices = engine.subscribe();

    assert!(engine.start());
    let notice = notices
        .recv_timeout(std::time::Duration::from_secs(2))
        .expect("dispatcher published");
    assert!(notice.generation > 0);
    assert_eq!(
        engine.transport_status().unwrap().status,
        SequencerStatus::Running
    );

    engine.stop_dispatcher();
    assert!(!engine.is_dispatcher_running());
}
