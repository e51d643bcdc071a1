#![warn(missing_docs)]
//! # proctor-watch-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `proctor-watch` workspace.
//!
//! ## Responsibilities
//! - Represent captured frames and their encoded wire form.
//! - Represent analyzer verdicts ([`ProctorResult`]) and event log records.
//! - Pin the wire event names and payload shapes of the analyzer channel.
//!
//! ## Data flow
//! Camera code emits [`Frame`] values, the encoder turns them into
//! [`EncodedFrame`] and then [`VideoFramePayload`] for the `video_frame`
//! event. Inbound `proctor_result` events become [`ProctorResult`] values that
//! drive the UI, which records [`LogEntry`] values.
//!
//! ## Ownership and lifetimes
//! Frames and payloads own their buffers (`Vec<u8>`/`String`) so they can cross
//! the capture/channel boundary without borrowing from the camera.
//!
//! ## Error model
//! Shape and codec failures return [`CoreError`].
//!
//! ## Example
//! ```rust
//! use proctor_watch_core::{Frame, InfractionType};
//!
//! let frame = Frame::new(2, 2, 0, vec![0; 16]).expect("valid frame");
//! assert_eq!(frame.width, 2);
//! assert_eq!(InfractionType::from("no_face"), InfractionType::NoFace);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outbound event carrying one sampled frame.
pub const VIDEO_FRAME_EVENT: &str = "video_frame";

/// Inbound event carrying one analyzer verdict.
pub const PROCTOR_RESULT_EVENT: &str = "proctor_result";

/// Fixed sampling period of the capture loop.
pub const CAPTURE_PERIOD_MS: u64 = 400;

/// Fixed JPEG quality used for outbound frames, on the `0.0..=1.0` scale.
pub const FRAME_JPEG_QUALITY: f32 = 0.5;

/// Maximum number of entries kept by the event log.
pub const EVENT_LOG_CAPACITY: usize = 20;

/// One sampled camera image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Native source width in pixels.
    pub width: u32,
    /// Native source height in pixels.
    pub height: u32,
    /// Capture time in session milliseconds.
    pub captured_at_ms: u64,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFrameShape`] when the pixel buffer length is
    /// not exactly `width * height * 4`.
    pub fn new(
        width: u32,
        height: u32,
        captured_at_ms: u64,
        rgba: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }
}

/// Image encoding of an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    /// Baseline JPEG.
    Jpeg,
}

impl ImageEncoding {
    /// MIME type used in data URLs.
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }
}

/// Compressed, self-contained frame ready for transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// Compressed image bytes.
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`.
    pub encoding: ImageEncoding,
    /// Quality used by the encoder, on the `0.0..=1.0` scale.
    pub quality: f32,
    /// Encoded width in pixels.
    pub width: u32,
    /// Encoded height in pixels.
    pub height: u32,
    /// Capture time of the source frame.
    pub captured_at_ms: u64,
}

/// Payload of the outbound `video_frame` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFramePayload {
    /// Base64 data URL of the encoded frame.
    pub image: String,
}

impl VideoFramePayload {
    /// Serializes payload to compact JSON.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(CoreError::Codec)
    }

    /// Deserializes payload from JSON.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON decoding fails.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(CoreError::Codec)
    }
}

/// Infraction category reported by the analyzer.
///
/// Unrecognized wire values are kept as [`InfractionType::Other`] so newer
/// analyzer categories never fail parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InfractionType {
    /// More than one face in frame.
    MultipleFaces,
    /// Subject is not facing the screen.
    LookingAway,
    /// No face in frame.
    NoFace,
    /// Any other wire value.
    Other(String),
}

impl InfractionType {
    /// Wire representation of this type.
    pub fn as_str(&self) -> &str {
        match self {
            InfractionType::MultipleFaces => "multiple_faces",
            InfractionType::LookingAway => "looking_away",
            InfractionType::NoFace => "no_face",
            InfractionType::Other(raw) => raw,
        }
    }

    /// Returns `true` for the three categories the client knows how to label.
    pub fn is_known(&self) -> bool {
        !matches!(self, InfractionType::Other(_))
    }
}

impl From<&str> for InfractionType {
    fn from(raw: &str) -> Self {
        match raw {
            "multiple_faces" => InfractionType::MultipleFaces,
            "looking_away" => InfractionType::LookingAway,
            "no_face" => InfractionType::NoFace,
            other => InfractionType::Other(other.to_string()),
        }
    }
}

impl From<String> for InfractionType {
    fn from(raw: String) -> Self {
        InfractionType::from(raw.as_str())
    }
}

impl From<InfractionType> for String {
    fn from(kind: InfractionType) -> Self {
        match kind {
            InfractionType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for InfractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analyzer verdict, as carried by the `proctor_result` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorResult {
    /// Trust score, clamped to `[0, 100]` by the sender.
    pub trust_score: f64,
    /// Number of faces detected in the frame.
    pub face_count: u32,
    /// Whether the verdict is an infraction.
    pub is_infraction: bool,
    /// Infraction category; only meaningful when `is_infraction` is true.
    #[serde(default)]
    pub infraction_type: Option<InfractionType>,
}

impl ProctorResult {
    /// Returns the infraction type when the verdict is an infraction.
    pub fn effective_infraction(&self) -> Option<&InfractionType> {
        if self.is_infraction {
            self.infraction_type.as_ref()
        } else {
            None
        }
    }
}

/// Severity of one event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    /// Session rule violation.
    Violation,
    /// Status information.
    Informational,
}

impl LogSeverity {
    /// Returns `true` for [`LogSeverity::Violation`].
    pub fn is_violation(self) -> bool {
        self == LogSeverity::Violation
    }
}

/// Immutable event log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Wall-clock stamp at `HH:MM:SS` precision.
    pub timestamp: String,
    /// Human-readable message.
    pub message: String,
    /// Entry severity.
    pub severity: LogSeverity,
}

impl LogEntry {
    /// Creates a log entry.
    pub fn new(
        timestamp: impl Into<String>,
        message: impl Into<String>,
        severity: LogSeverity,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Lifecycle state of the analyzer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Channel opened, no lifecycle event seen yet.
    Connecting,
    /// Channel reported `connect`.
    Connected,
    /// Channel reported `disconnect`.
    Disconnected,
}

/// Error type for core validation and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Frame dimensions overflow addressable memory.
    #[error("frame dimensions overflow: {width}x{height}")]
    DimensionOverflow {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// JSON encoding/decoding error.
    #[error("payload codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::DimensionOverflow { width, height })
}
