//! Tests the JSON shape of wire payloads.

use proctor_watch_core::{InfractionType, ProctorResult, VideoFramePayload};
use serde_json::json;

#[test]
fn wire_payload_tests_video_frame_has_single_image_field() {
    let payload = VideoFramePayload {
        image: "data:image/jpeg;base64,AAAA".to_string(),
    };

    let encoded = payload.to_json().expect("encoding should succeed");
    let value: serde_json::Value = serde_json::from_str(&encoded).expect("valid json");
    assert_eq!(value, json!({ "image": "data:image/jpeg;base64,AAAA" }));
}

#[test]
fn wire_payload_tests_proctor_result_serializes_null_type() {
    let result = ProctorResult {
        trust_score: 99.5,
        face_count: 1,
        is_infraction: false,
        infraction_type: None,
    };

    let value = serde_json::to_value(&result).expect("encoding should succeed");
    assert_eq!(
        value,
        json!({
            "trust_score": 99.5,
            "face_count": 1,
            "is_infraction": false,
            "infraction_type": null
        })
    );
}

#[test]
fn wire_payload_tests_proctor_result_reads_known_type() {
    let result: ProctorResult = serde_json::from_value(json!({
        "trust_score": 42,
        "face_count": 2,
        "is_infraction": true,
        "infraction_type": "multiple_faces"
    }))
    .expect("decoding should succeed");

    assert_eq!(result.trust_score, 42.0);
    assert_eq!(result.infraction_type, Some(InfractionType::MultipleFaces));
}
