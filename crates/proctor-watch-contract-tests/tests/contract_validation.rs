//! Validates wire fixtures and produced payloads against frozen JSON schemas.

use std::sync::mpsc;

use jsonschema::JSONSchema;
use proctor_watch_analysis_contract::{MalformedResultError, parse_proctor_result};
use proctor_watch_channel::{ChannelTransport, TransportEvent};
use proctor_watch_core::{InfractionType, PROCTOR_RESULT_EVENT, VIDEO_FRAME_EVENT};
use proctor_watch_encode::{Canvas, frame_payload};
use proctor_watch_loopback::{FaceCountScript, LoopbackAnalyzer};
use serde_json::Value;
use url::Url;

const VIDEO_FRAME_SCHEMA: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/video-frame.schema.json"
);
const PROCTOR_RESULT_SCHEMA: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../contracts/proctor-result.schema.json"
);

fn fixture_path(name: &str) -> String {
    format!("{}/../../contracts/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn load_raw(path: &str) -> String {
    std::fs::read_to_string(path).expect("json file should be readable")
}

fn load_json(path: &str) -> Value {
    serde_json::from_str(&load_raw(path)).expect("json file should be valid")
}

fn compile_validator(schema_path: &str) -> JSONSchema {
    let schema = load_json(schema_path);
    JSONSchema::compile(&schema).expect("schema should compile")
}

#[test]
fn video_frame_fixture_matches_schema() {
    let validator = compile_validator(VIDEO_FRAME_SCHEMA);
    let fixture = load_json(&fixture_path("video-frame.valid.json"));
    assert!(
        validator.is_valid(&fixture),
        "video frame fixture should validate against schema"
    );
}

#[test]
fn proctor_result_fixtures_match_schema_and_parse() {
    let validator = compile_validator(PROCTOR_RESULT_SCHEMA);

    for name in ["proctor-result.infraction.json", "proctor-result.clean.json"] {
        let path = fixture_path(name);
        assert!(
            validator.is_valid(&load_json(&path)),
            "{name} should validate against schema"
        );
        parse_proctor_result(&load_raw(&path)).expect("valid fixture should parse");
    }

    let raw = load_raw(&fixture_path("proctor-result.infraction.json"));
    let infraction = parse_proctor_result(&raw).expect("infraction fixture should parse");
    assert_eq!(infraction.infraction_type, Some(InfractionType::LookingAway));
}

#[test]
fn malformed_fixture_fails_schema_and_parser() {
    let validator = compile_validator(PROCTOR_RESULT_SCHEMA);
    let path = fixture_path("proctor-result.malformed.json");

    assert!(!validator.is_valid(&load_json(&path)));
    assert!(matches!(
        parse_proctor_result(&load_raw(&path)),
        Err(MalformedResultError::MissingField("face_count"))
    ));
}

#[test]
fn encoded_frame_payload_matches_schema() {
    let validator = compile_validator(VIDEO_FRAME_SCHEMA);
    let mut canvas = Canvas::new();
    canvas.resize(8, 6);
    let encoded = canvas.encode_jpeg(0.5, 0).expect("canvas should encode");

    let payload = frame_payload(&encoded)
        .to_json()
        .expect("payload should serialize");
    let value: Value = serde_json::from_str(&payload).expect("payload should be json");

    assert!(validator.is_valid(&value), "produced frame should validate");
}

#[test]
fn loopback_verdicts_match_schema() {
    let validator = compile_validator(PROCTOR_RESULT_SCHEMA);
    let analyzer = LoopbackAnalyzer::new(FaceCountScript::new(vec![2]));
    let (inbound_tx, inbound_rx) = mpsc::channel();
    let endpoint = Url::parse("ws://127.0.0.1:5000/").expect("endpoint should parse");
    analyzer
        .connect(&endpoint, inbound_tx)
        .expect("loopback should connect");
    let frame = load_raw(&fixture_path("video-frame.valid.json"));

    for _ in 0..12 {
        analyzer
            .emit(VIDEO_FRAME_EVENT, &frame)
            .expect("loopback should accept frame");
    }

    let verdicts: Vec<Value> = inbound_rx
        .try_iter()
        .filter_map(|event| match event {
            TransportEvent::Message { event, payload } if event == PROCTOR_RESULT_EVENT => {
                Some(serde_json::from_str(&payload).expect("verdict should be json"))
            }
            _ => None,
        })
        .collect();

    assert_eq!(verdicts.len(), 12);
    assert!(verdicts.iter().all(|verdict| validator.is_valid(verdict)));
    assert_eq!(verdicts[11]["infraction_type"], "multiple_faces");
}
