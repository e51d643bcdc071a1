//! Integration tests for the in-process analyzer.

use std::sync::Arc;

use proctor_watch_channel::{ChannelEvent, ResultChannel};
use proctor_watch_core::{InfractionType, VideoFramePayload};
use proctor_watch_loopback::{FaceCountScript, LoopbackAnalyzer};

const ENDPOINT: &str = "ws://127.0.0.1:5000/";

fn frame() -> VideoFramePayload {
    VideoFramePayload {
        image: "data:image/jpeg;base64,AAAA".to_string(),
    }
}

fn open(analyzer: &Arc<LoopbackAnalyzer>) -> ResultChannel {
    let mut channel = ResultChannel::open(ENDPOINT, analyzer.clone()).expect("channel should open");
    assert!(matches!(channel.try_next_event(), Some(ChannelEvent::Connected)));
    channel
}

fn next_verdict(channel: &mut ResultChannel) -> proctor_watch_core::ProctorResult {
    match channel.try_next_event() {
        Some(ChannelEvent::Verdict(result)) => result,
        other => panic!("expected verdict, got {other:?}"),
    }
}

#[test]
fn loopback_analyzer_tests_answers_each_frame_with_a_verdict() {
    let analyzer = Arc::new(LoopbackAnalyzer::new(FaceCountScript::new(vec![1])));
    let mut channel = open(&analyzer);

    channel.send(&frame());
    let verdict = next_verdict(&mut channel);

    assert_eq!(verdict.trust_score, 100.0);
    assert_eq!(verdict.face_count, 1);
    assert!(!verdict.is_infraction);
    assert_eq!(verdict.infraction_type, None);
    assert_eq!(analyzer.frames_seen(), 1);
}

#[test]
fn loopback_analyzer_tests_raises_infraction_after_stabilization() {
    let analyzer = Arc::new(LoopbackAnalyzer::new(FaceCountScript::new(vec![2])));
    let mut channel = open(&analyzer);

    let mut verdicts = Vec::new();
    for _ in 0..11 {
        channel.send(&frame());
        verdicts.push(next_verdict(&mut channel));
    }

    assert!(verdicts[..9].iter().all(|verdict| !verdict.is_infraction));
    assert_eq!(verdicts[9].infraction_type, Some(InfractionType::MultipleFaces));
    assert_eq!(verdicts[9].trust_score, 99.5);
    assert_eq!(verdicts[10].trust_score, 99.0);
}

#[test]
fn loopback_analyzer_tests_undecodable_frame_is_rejected_by_client() {
    let analyzer = Arc::new(LoopbackAnalyzer::new(FaceCountScript::new(vec![1])));
    let mut channel = open(&analyzer);

    channel.send(&VideoFramePayload {
        image: "not a data url".to_string(),
    });

    assert!(matches!(channel.try_next_event(), Some(ChannelEvent::Rejected(_))));
    assert_eq!(channel.stats().verdicts_rejected, 1);
}

#[test]
fn loopback_analyzer_tests_hang_up_disconnects_client() {
    let analyzer = Arc::new(LoopbackAnalyzer::default());
    let mut channel = open(&analyzer);

    analyzer.hang_up();

    assert!(matches!(channel.try_next_event(), Some(ChannelEvent::Disconnected)));
    channel.send(&frame());
    assert_eq!(channel.stats().send_failures, 1);
}
