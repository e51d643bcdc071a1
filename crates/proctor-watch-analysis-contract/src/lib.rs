#![warn(missing_docs)]
//! # proctor-watch-analysis-contract
//!
//! ## Purpose
//! Defines how inbound `proctor_result` payloads are validated before they
//! reach the renderer.
//!
//! ## Responsibilities
//! - Parse raw verdict JSON into [`ProctorResult`] values.
//! - Reject payloads that are missing required fields or carry invalid types.
//! - Report non-fatal anomalies (out-of-range scores, unknown categories) so
//!   callers can log them while still rendering the verdict.
//!
//! ## Data flow
//! Raw JSON from the channel -> [`parse_proctor_result`] -> [`ProctorResult`]
//! -> [`verdict_anomalies`] -> session controller.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned so they outlive the transport buffer they came from.
//!
//! ## Error model
//! Wholly malformed payloads return [`MalformedResultError`]. A missing or
//! unrecognized `infraction_type` is not an error: it is reported as a
//! [`VerdictAnomaly`] and renders as an empty alert message.

use std::fmt;

use proctor_watch_core::{InfractionType, ProctorResult};
use serde_json::{Map, Value};
use thiserror::Error;

/// Inclusive lower bound of the trust score range.
pub const TRUST_SCORE_MIN: f64 = 0.0;

/// Inclusive upper bound of the trust score range.
pub const TRUST_SCORE_MAX: f64 = 100.0;

/// Parses one raw `proctor_result` payload.
///
/// # Errors
/// Returns [`MalformedResultError::Decode`] for invalid JSON and the other
/// variants when the payload shape violates the verdict contract.
pub fn parse_proctor_result(raw: &str) -> Result<ProctorResult, MalformedResultError> {
    let value: Value = serde_json::from_str(raw).map_err(MalformedResultError::Decode)?;
    proctor_result_from_value(&value)
}

/// Validates an already-decoded `proctor_result` payload.
///
/// # Errors
/// Returns [`MalformedResultError`] when the value is not an object, a
/// required field is absent, or a field has the wrong type.
pub fn proctor_result_from_value(value: &Value) -> Result<ProctorResult, MalformedResultError> {
    let object = value.as_object().ok_or(MalformedResultError::NotAnObject)?;

    let trust_score = required(object, "trust_score")?
        .as_f64()
        .ok_or(MalformedResultError::InvalidField {
            field: "trust_score",
            reason: "expected a number",
        })?;

    let face_count = required(object, "face_count")?
        .as_u64()
        .and_then(|count| u32::try_from(count).ok())
        .ok_or(MalformedResultError::InvalidField {
            field: "face_count",
            reason: "expected a non-negative integer",
        })?;

    let is_infraction = required(object, "is_infraction")?
        .as_bool()
        .ok_or(MalformedResultError::InvalidField {
            field: "is_infraction",
            reason: "expected a boolean",
        })?;

    // Non-string categories pass through as `Other` and render as an empty message.
    let infraction_type = match object.get("infraction_type") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(InfractionType::from(raw.as_str())),
        Some(other) => Some(InfractionType::Other(other.to_string())),
    };

    Ok(ProctorResult {
        trust_score,
        face_count,
        is_infraction,
        infraction_type,
    })
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, MalformedResultError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MalformedResultError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

/// Non-fatal irregularity in an otherwise valid verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum VerdictAnomaly {
    /// Trust score lies outside `[0, 100]`; rendered unclamped.
    TrustScoreOutOfRange(f64),
    /// Infraction flagged without a category.
    MissingInfractionType,
    /// Infraction category the client has no label for.
    UnknownInfractionType(String),
    /// Category sent alongside `is_infraction == false`; ignored.
    IgnoredInfractionType(InfractionType),
}

impl fmt::Display for VerdictAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictAnomaly::TrustScoreOutOfRange(score) => {
                write!(f, "trust score {score} outside [0, 100]")
            }
            VerdictAnomaly::MissingInfractionType => f.write_str("infraction without type"),
            VerdictAnomaly::UnknownInfractionType(raw) => {
                write!(f, "unknown infraction type '{raw}'")
            }
            VerdictAnomaly::IgnoredInfractionType(kind) => {
                write!(f, "infraction type '{kind}' sent without infraction flag")
            }
        }
    }
}

/// Lists anomalies in a parsed verdict.
pub fn verdict_anomalies(result: &ProctorResult) -> Vec<VerdictAnomaly> {
    let mut anomalies = Vec::new();

    if !(TRUST_SCORE_MIN..=TRUST_SCORE_MAX).contains(&result.trust_score) {
        anomalies.push(VerdictAnomaly::TrustScoreOutOfRange(result.trust_score));
    }

    match (result.is_infraction, &result.infraction_type) {
        (true, None) => anomalies.push(VerdictAnomaly::MissingInfractionType),
        (true, Some(InfractionType::Other(raw))) => {
            anomalies.push(VerdictAnomaly::UnknownInfractionType(raw.clone()));
        }
        (false, Some(kind)) => anomalies.push(VerdictAnomaly::IgnoredInfractionType(kind.clone())),
        _ => {}
    }

    anomalies
}

/// Verdict contract errors.
#[derive(Debug, Error)]
pub enum MalformedResultError {
    /// JSON decode failure.
    #[error("verdict decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Payload is valid JSON but not an object.
    #[error("verdict payload is not a JSON object")]
    NotAnObject,
    /// Required field is absent or null.
    #[error("verdict field '{0}' is missing")]
    MissingField(&'static str),
    /// Field is present with an unusable type or value.
    #[error("verdict field '{field}' is invalid: {reason}")]
    InvalidField {
        /// Offending field name.
        field: &'static str,
        /// What the contract expects.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for verdict parsing edge cases.

    use super::*;

    #[test]
    fn missing_type_on_infraction_is_an_anomaly_not_an_error() {
        let raw = r#"{"trust_score":70,"face_count":0,"is_infraction":true}"#;
        let result = parse_proctor_result(raw).expect("payload should parse");
        assert_eq!(result.infraction_type, None);
        assert_eq!(verdict_anomalies(&result), vec![VerdictAnomaly::MissingInfractionType]);
    }

    #[test]
    fn rejects_negative_face_count() {
        let error =
            parse_proctor_result(r#"{"trust_score":70,"face_count":-1,"is_infraction":false}"#)
                .expect_err("negative count should be rejected");
        assert!(matches!(
            error,
            MalformedResultError::InvalidField {
                field: "face_count",
                ..
            }
        ));
    }
}
