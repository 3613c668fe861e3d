//! Integration tests for the duplex turn-taking core.
//!
//! The live-capture test requires a microphone and the arecord/sox pipeline;
//! it is ignored by default. Everything else runs headless.

use std::time::Duration;
use voxa_voice::{
    AudioFrame, CaptureConfig, CaptureEngine, RecordingTracker, TurnConfig, FRAME_BYTES,
};

fn silent_block(frames: usize) -> Vec<AudioFrame> {
    vec![AudioFrame::new(vec![0u8; FRAME_BYTES]); frames]
}

/// The full listening scenario: silence, a wake block, one speech block,
/// then the silence timeout, ending with a non-empty utterance of exactly
/// the eight observed blocks.
#[test]
fn listen_scenario_collects_exactly_eight_blocks() {
    let config = TurnConfig::default();

    // Five silent polled blocks: no wake.
    for _ in 0..5 {
        assert!(!config.wakes(0.0));
    }

    // One block with sensitive ratio 0.5 starts recording.
    assert!(config.wakes(0.5));

    // One speech block, then seven silent blocks, commits the turn.
    let mut tracker = RecordingTracker::new(config.silence_blocks);
    assert!(!tracker.observe(silent_block(3), true));
    for i in 0..7 {
        let complete = tracker.observe(silent_block(3), false);
        assert_eq!(complete, i == 6, "completion must land on the 7th silent block");
    }
    assert_eq!(tracker.blocks(), 8);

    let utterance = tracker.into_utterance();
    assert!(!utterance.is_empty());
    assert_eq!(utterance.frames.len(), 8 * 3);
}

#[test]
fn wake_and_barge_boundaries_match_the_transition_table() {
    let config = TurnConfig::default();
    assert!(config.wakes(0.2), "wake threshold is inclusive");
    assert!(!config.wakes(0.19));

    let at_grace = Duration::from_millis(400);
    assert!(config.barges(at_grace, 0.61), "barge-in threshold is strict");
    assert!(!config.barges(at_grace, 0.6));
    assert!(
        !config.barges(Duration::from_millis(399), 1.0),
        "blocks inside the grace window never barge in"
    );
}

#[test]
fn engine_stop_is_safe_in_any_order() {
    let mut engine = CaptureEngine::new(CaptureConfig {
        pipeline: "sleep 5".to_string(),
        ring_capacity: 8,
    });
    engine.stop();
    engine.start().expect("start");
    engine.stop();
    engine.stop();
}

#[test]
#[ignore] // Requires a microphone and the arecord/sox pipeline.
fn live_capture_produces_canonical_frames() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut engine = CaptureEngine::new(CaptureConfig::from_env());
    engine.start().expect("start capture pipeline");

    let mut collected = Vec::new();
    for _ in 0..50 {
        collected.extend(engine.poll_block(Duration::from_millis(100)));
        if collected.len() >= 10 {
            break;
        }
    }
    engine.stop();

    assert!(
        collected.len() >= 10,
        "expected at least 10 frames from the live pipeline"
    );
    assert!(collected.iter().all(AudioFrame::is_canonical));
}
