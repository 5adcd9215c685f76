//! Property tests for block-size independence

use proptest::prelude::*;
use rondo::prelude::*;

use crate::helpers::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However the device slices time, the play head lands on the same frame.
    #[test]
    fn play_head_ignores_block_sizes(blocks in prop::collection::vec(1usize..3_000, 1..24)) {
        let engine = test_engine();
        engine.set_beats(1, 1);
        engine.start();
        dispatch(&engine);
        let audio = AudioThread::for_engine(&engine);

        let mut total = 0u64;
        for frames in &blocks {
            let out = audio.render(*frames);
            prop_assert_eq!(out.len(), frames * audio.output_channels());
            total += *frames as u64;
        }

        let status = engine.transport_status().unwrap();
        prop_assert_eq!(status.current_frame, total % status.frames_in_loop);
    }

    /// A constant input is monitored unchanged whatever the block size.
    #[test]
    fn monitoring_ignores_block_sizes(frames in 1usize..2_000, level in -1.0f32..1.0) {
        let engine = test_engine();
        engine.set_input_monitor(true);
        let audio = AudioThread::for_engine(&engine);

        let out = audio.render_input(vec![level; frames * 2], frames);
        prop_assert_eq!(out.len(), frames * 2);
        prop_assert!(out.iter().all(|s| (*s - level).abs() < 1e-6));
    }
}
