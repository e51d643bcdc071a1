#![warn(missing_docs)]
//! # proctor-watch-loopback
//!
//! ## Purpose
//! Local stand-in for the remote analyzer, used by the demo binary and by
//! end-to-end tests.
//!
//! ## Responsibilities
//! - Shape verdicts the way the analyzer service does: a per-connection trust
//!   ledger and a stabilization buffer in front of infraction reporting.
//! - Replace the face detector with a scripted face-count sequence.
//! - Implement [`ChannelTransport`] so a [`proctor_watch_channel::ResultChannel`]
//!   can talk to it in-process.
//!
//! ## Data flow
//! `video_frame` emit -> data URL check -> [`FaceCountScript`] ->
//! [`InfractionDebouncer`] -> [`TrustLedger`] -> `proctor_result` pushed
//! inbound.
//!
//! ## Error model
//! Frames whose image does not decode still get a reply, but one without
//! verdict fields, which the client rejects as malformed.

use std::sync::Mutex;
use std::sync::mpsc::Sender;

use proctor_watch_channel::{ChannelTransport, ConnectionError, TransportEvent};
use proctor_watch_core::{
    InfractionType, PROCTOR_RESULT_EVENT, ProctorResult, VIDEO_FRAME_EVENT, VideoFramePayload,
};
use proctor_watch_encode::parse_data_url;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

/// Trust score assigned to each new connection.
pub const INITIAL_TRUST_SCORE: f64 = 100.0;

/// Score lost per infraction verdict.
pub const INFRACTION_DECAY: f64 = 0.5;

/// Consecutive bad frames tolerated before an infraction is raised.
pub const DEBOUNCE_THRESHOLD: u32 = 9;

/// Per-connection trust score. Decays on infractions and never recovers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustLedger {
    score: f64,
}

impl TrustLedger {
    /// Starts at [`INITIAL_TRUST_SCORE`].
    pub fn new() -> Self {
        Self {
            score: INITIAL_TRUST_SCORE,
        }
    }

    /// Records one verdict and returns the reported score.
    pub fn record(&mut self, is_infraction: bool) -> f64 {
        if is_infraction {
            self.score = (self.score - INFRACTION_DECAY).max(0.0);
        }
        self.reported()
    }

    /// Score rounded to one decimal, as sent on the wire.
    pub fn reported(&self) -> f64 {
        (self.score * 10.0).round() / 10.0
    }

    /// Restores the initial score.
    pub fn reset(&mut self) {
        self.score = INITIAL_TRUST_SCORE;
    }
}

impl Default for TrustLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifies one frame by face count: `multiple_faces` above one face,
/// `no_face` at zero.
pub fn classify_face_count(face_count: u32) -> Option<InfractionType> {
    match face_count {
        0 => Some(InfractionType::NoFace),
        1 => None,
        _ => Some(InfractionType::MultipleFaces),
    }
}

/// Stabilization buffer: reports an infraction only after the bad streak
/// exceeds the threshold. Any good frame resets the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfractionDebouncer {
    streak: u32,
    threshold: u32,
}

impl InfractionDebouncer {
    /// Creates a debouncer with [`DEBOUNCE_THRESHOLD`].
    pub fn new() -> Self {
        Self::with_threshold(DEBOUNCE_THRESHOLD)
    }

    /// Creates a debouncer with a custom threshold.
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            streak: 0,
            threshold,
        }
    }

    /// Feeds one frame's face count.
    pub fn observe(&mut self, face_count: u32) -> Option<InfractionType> {
        let Some(kind) = classify_face_count(face_count) else {
            self.streak = 0;
            return None;
        };

        self.streak = self.streak.saturating_add(1);
        (self.streak > self.threshold).then_some(kind)
    }

    /// Current bad-frame streak.
    pub fn streak(&self) -> u32 {
        self.streak
    }
}

impl Default for InfractionDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cyclic face-count sequence standing in for face detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceCountScript {
    counts: Vec<u32>,
    cursor: usize,
}

impl FaceCountScript {
    /// Creates a script; an empty list behaves as a single face forever.
    pub fn new(counts: Vec<u32>) -> Self {
        let counts = if counts.is_empty() { vec![1] } else { counts };
        Self { counts, cursor: 0 }
    }

    /// Demo session: attentive, absent, attentive, joined by a second person.
    pub fn demo() -> Self {
        let mut counts = Vec::new();
        counts.extend(std::iter::repeat_n(1, 15));
        counts.extend(std::iter::repeat_n(0, 14));
        counts.extend(std::iter::repeat_n(1, 10));
        counts.extend(std::iter::repeat_n(2, 14));
        counts.extend(std::iter::repeat_n(1, 12));
        Self::new(counts)
    }

    /// Next face count, wrapping at the end.
    pub fn next_count(&mut self) -> u32 {
        let count = self.counts[self.cursor % self.counts.len()];
        self.cursor = (self.cursor + 1) % self.counts.len();
        count
    }
}

#[derive(Debug)]
struct LoopbackState {
    inbound: Option<Sender<TransportEvent>>,
    script: FaceCountScript,
    debouncer: InfractionDebouncer,
    ledger: TrustLedger,
    frames_seen: u64,
}

/// In-process analyzer implementing [`ChannelTransport`].
#[derive(Debug)]
pub struct LoopbackAnalyzer {
    state: Mutex<LoopbackState>,
}

impl LoopbackAnalyzer {
    /// Creates an analyzer driven by `script`.
    pub fn new(script: FaceCountScript) -> Self {
        Self {
            state: Mutex::new(LoopbackState {
                inbound: None,
                script,
                debouncer: InfractionDebouncer::new(),
                ledger: TrustLedger::new(),
                frames_seen: 0,
            }),
        }
    }

    /// Drops the connection and notifies the client.
    pub fn hang_up(&self) {
        if let Ok(mut state) = self.state.lock()
            && let Some(inbound) = state.inbound.take()
        {
            let _ = inbound.send(TransportEvent::Disconnect);
        }
    }

    /// Number of frames received so far.
    pub fn frames_seen(&self) -> u64 {
        self.state.lock().map(|state| state.frames_seen).unwrap_or(0)
    }

    fn verdict_for(state: &mut LoopbackState, payload: &str) -> String {
        let decoded = VideoFramePayload::from_json(payload)
            .map_err(|error| error.to_string())
            .and_then(|frame| parse_data_url(&frame.image).map_err(|error| error.to_string()));

        if let Err(error) = decoded {
            warn!(%error, "loopback analyzer could not decode frame");
            // Mirrors the service's reply for undecodable frames.
            return json!({
                "trust_score": state.ledger.reported(),
                "face_count": null,
                "is_infraction": null,
                "infraction_type": null,
            })
            .to_string();
        }

        let face_count = state.script.next_count();
        let infraction_type = state.debouncer.observe(face_count);
        let trust_score = state.ledger.record(infraction_type.is_some());
        let result = ProctorResult {
            trust_score,
            face_count,
            is_infraction: infraction_type.is_some(),
            infraction_type,
        };

        serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for LoopbackAnalyzer {
    fn default() -> Self {
        Self::new(FaceCountScript::demo())
    }
}

impl ChannelTransport for LoopbackAnalyzer {
    fn connect(
        &self,
        endpoint: &Url,
        inbound: Sender<TransportEvent>,
    ) -> Result<(), ConnectionError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ConnectionError::Transport("loopback state lock poisoned".to_string()))?;

        inbound
            .send(TransportEvent::Connect)
            .map_err(|error| ConnectionError::Transport(error.to_string()))?;
        state.ledger.reset();
        state.inbound = Some(inbound);
        debug!(endpoint = %endpoint, "loopback analyzer connected");
        Ok(())
    }

    fn emit(&self, event: &str, payload: &str) -> Result<(), ConnectionError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ConnectionError::Transport("loopback state lock poisoned".to_string()))?;

        if state.inbound.is_none() {
            return Err(ConnectionError::NotConnected);
        }
        if event != VIDEO_FRAME_EVENT {
            debug!(event, "loopback analyzer ignoring event");
            return Ok(());
        }

        state.frames_seen += 1;
        let reply = Self::verdict_for(&mut state, payload);
        let delivered = state.inbound.as_ref().is_some_and(|inbound| {
            inbound
                .send(TransportEvent::Message {
                    event: PROCTOR_RESULT_EVENT.to_string(),
                    payload: reply,
                })
                .is_ok()
        });

        if !delivered {
            state.inbound = None;
            return Err(ConnectionError::NotConnected);
        }
        Ok(())
    }
}
