//! Integration tests for inbound verdict parsing.

use proctor_watch_analysis_contract::{
    MalformedResultError, VerdictAnomaly, parse_proctor_result, verdict_anomalies,
};
use proctor_watch_core::InfractionType;

#[test]
fn verdict_parsing_tests_accepts_full_payload() {
    let raw = r#"{
        "trust_score": 42,
        "face_count": 2,
        "is_infraction": true,
        "infraction_type": "looking_away"
    }"#;

    let result = parse_proctor_result(raw).expect("verdict should parse");
    assert_eq!(result.trust_score, 42.0);
    assert_eq!(result.face_count, 2);
    assert!(result.is_infraction);
    assert_eq!(result.infraction_type, Some(InfractionType::LookingAway));
    assert!(verdict_anomalies(&result).is_empty());
}

#[test]
fn verdict_parsing_tests_accepts_null_type() {
    let raw = r#"{"trust_score":99.5,"face_count":1,"is_infraction":false,"infraction_type":null}"#;

    let result = parse_proctor_result(raw).expect("verdict should parse");
    assert_eq!(result.infraction_type, None);
    assert!(verdict_anomalies(&result).is_empty());
}

#[test]
fn verdict_parsing_tests_rejects_missing_required_fields() {
    let error = parse_proctor_result(r#"{"face_count":1,"is_infraction":false}"#)
        .expect_err("missing score should be rejected");
    assert!(matches!(error, MalformedResultError::MissingField("trust_score")));

    let error = parse_proctor_result(r#"{"trust_score":80,"face_count":1}"#)
        .expect_err("missing flag should be rejected");
    assert!(matches!(error, MalformedResultError::MissingField("is_infraction")));
}

#[test]
fn verdict_parsing_tests_rejects_non_objects_and_bad_json() {
    assert!(matches!(
        parse_proctor_result("[1, 2, 3]"),
        Err(MalformedResultError::NotAnObject)
    ));
    assert!(matches!(
        parse_proctor_result("{not json"),
        Err(MalformedResultError::Decode(_))
    ));
    assert!(matches!(
        parse_proctor_result(r#"{"trust_score":"high","face_count":1,"is_infraction":false}"#),
        Err(MalformedResultError::InvalidField {
            field: "trust_score",
            ..
        })
    ));
}

#[test]
fn verdict_parsing_tests_reports_out_of_range_and_unknown_type() {
    let raw =
        r#"{"trust_score":140,"face_count":1,"is_infraction":true,"infraction_type":"bogus"}"#;

    let result = parse_proctor_result(raw).expect("verdict should still parse");
    assert_eq!(result.trust_score, 140.0);
    assert_eq!(
        verdict_anomalies(&result),
        vec![
            VerdictAnomaly::TrustScoreOutOfRange(140.0),
            VerdictAnomaly::UnknownInfractionType("bogus".to_string()),
        ]
    );
}

#[test]
fn verdict_parsing_tests_flags_type_without_infraction() {
    let raw =
        r#"{"trust_score":90,"face_count":0,"is_infraction":false,"infraction_type":"no_face"}"#;

    let result = parse_proctor_result(raw).expect("verdict should parse");
    assert_eq!(
        verdict_anomalies(&result),
        vec![VerdictAnomaly::IgnoredInfractionType(InfractionType::NoFace)]
    );
}
