//! Benchmark smoke test for the encode -> send -> verdict -> render loop.

use std::sync::Arc;
use std::time::Instant;

use proctor_watch_channel::{ChannelEvent, ResultChannel};
use proctor_watch_core::Frame;
use proctor_watch_encode::{Canvas, frame_payload};
use proctor_watch_loopback::{FaceCountScript, LoopbackAnalyzer};
use proctor_watch_ui::{UiState, project_view};

#[test]
fn benchmark_frame_round_trip_smoke_prints_latency() {
    let analyzer = Arc::new(LoopbackAnalyzer::new(FaceCountScript::demo()));
    let mut channel =
        ResultChannel::open("ws://127.0.0.1:5000/", analyzer).expect("channel should open");
    let mut state = UiState::new("bench");
    let mut canvas = Canvas::new();
    canvas.resize(64, 48);

    let start = Instant::now();
    let mut payload_bytes = 0usize;
    let mut verdicts = 0usize;

    for index in 0..100_u64 {
        let frame = Frame::new(64, 48, index, vec![index as u8; 64 * 48 * 4])
            .expect("frame should be valid");
        canvas.draw_frame(&frame).expect("frame should draw");
        let encoded = canvas.encode_jpeg(0.5, index).expect("frame should encode");
        let payload = frame_payload(&encoded);
        payload_bytes += payload.image.len();
        channel.send(&payload);

        while let Some(event) = channel.try_next_event() {
            if let ChannelEvent::Verdict(result) = event {
                state.apply_verdict(&result);
                verdicts += 1;
            }
        }
        let _ = project_view(&state);
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_round_trip_elapsed_ms={elapsed_ms}");
    println!("benchmark_payload_total_bytes={payload_bytes}");

    assert_eq!(verdicts, 100);
    // Lightweight guardrail; strict latency checks are environment-specific.
    assert!(elapsed_ms < 5_000, "round trip smoke benchmark should stay bounded");
}
