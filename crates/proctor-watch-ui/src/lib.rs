#![warn(missing_docs)]
//! # proctor-watch-ui
//!
//! ## Purpose
//! Defines the observer-facing state model of a monitoring session and its
//! projection onto abstract UI regions.
//!
//! ## Responsibilities
//! - Map trust scores to a circular gauge offset and severity band.
//! - Latch the infraction alert banner from each verdict.
//! - Keep the bounded, newest-first event log.
//! - Reflect channel lifecycle in the connection badge.
//! - Project [`UiState`] into a flat [`ViewSnapshot`] for any [`UiSurface`].
//!
//! ## Data flow
//! Session events mutate [`UiState`] through pure transitions; the session
//! then calls [`project_view`] and hands the snapshot to a [`UiSurface`].
//!
//! ## Ownership and lifetimes
//! `UiState` owns every value it renders, so it can be cloned into tests or
//! passed to renderers without borrowing session internals.
//!
//! ## Error model
//! This crate has no recoverable errors. Out-of-range scores and unknown
//! infraction types render deterministically instead of failing.

use std::collections::VecDeque;
use std::f64::consts::PI;

use proctor_watch_core::{
    ConnectionState, EVENT_LOG_CAPACITY, InfractionType, LogEntry, LogSeverity, ProctorResult,
};
use time::OffsetDateTime;

/// Default radius of the trust gauge ring.
pub const DEFAULT_GAUGE_RADIUS: f64 = 52.0;

/// Scores strictly below this value are in the danger band.
pub const DANGER_BELOW: f64 = 50.0;

/// Scores strictly below this value (and not danger) are in the warning band.
pub const WARNING_BELOW: f64 = 80.0;

/// Presentation tone shared by all regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Red.
    Danger,
    /// Orange.
    Warning,
    /// Green.
    Success,
    /// Muted text color.
    Secondary,
}

impl Tone {
    /// Stable lowercase name for renderers.
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Danger => "danger",
            Tone::Warning => "warning",
            Tone::Success => "success",
            Tone::Secondary => "secondary",
        }
    }
}

/// Severity band of a trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeBand {
    /// `score < 50`.
    Danger,
    /// `50 <= score < 80`.
    Warning,
    /// `score >= 80`.
    Success,
}

impl GaugeBand {
    /// Tone used to stroke the gauge.
    pub fn tone(self) -> Tone {
        match self {
            GaugeBand::Danger => Tone::Danger,
            GaugeBand::Warning => Tone::Warning,
            GaugeBand::Success => Tone::Success,
        }
    }
}

/// Bands a raw, unclamped score.
pub fn band_for_score(score: f64) -> GaugeBand {
    if score < DANGER_BELOW {
        GaugeBand::Danger
    } else if score < WARNING_BELOW {
        GaugeBand::Warning
    } else {
        GaugeBand::Success
    }
}

/// Dash offset of the filled arc: `C - (score / 100) * C`.
///
/// The raw score is used as-is; out-of-range scores yield offsets outside
/// `[0, C]`.
pub fn arc_offset(circumference: f64, score: f64) -> f64 {
    circumference - (score / 100.0) * circumference
}

/// Circular trust score indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustGauge {
    circumference: f64,
    score: f64,
}

impl TrustGauge {
    /// Creates a full gauge (score 100) with the given ring radius.
    pub fn new(radius: f64) -> Self {
        Self {
            circumference: 2.0 * PI * radius,
            score: 100.0,
        }
    }

    /// Displays `score` as received.
    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    /// Last raw score.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Ring circumference.
    pub fn circumference(&self) -> f64 {
        self.circumference
    }

    /// Current arc offset.
    pub fn offset(&self) -> f64 {
        arc_offset(self.circumference, self.score)
    }

    /// Current severity band.
    pub fn band(&self) -> GaugeBand {
        band_for_score(self.score)
    }

    /// Numeric label mirroring the raw score, e.g. `42%` or `99.5%`.
    pub fn label(&self) -> String {
        format!("{}%", self.score)
    }
}

impl Default for TrustGauge {
    fn default() -> Self {
        Self::new(DEFAULT_GAUGE_RADIUS)
    }
}

/// Alert text for an infraction category. Unknown or missing types map to an
/// empty message.
pub fn alert_message(kind: Option<&InfractionType>) -> &'static str {
    match kind {
        Some(InfractionType::MultipleFaces) => "Multiple Faces Detected!",
        Some(InfractionType::LookingAway) => "Looking Away Detected!",
        Some(InfractionType::NoFace) => "No Face Detected!",
        Some(InfractionType::Other(_)) | None => "",
    }
}

/// Latched alert banner state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertState {
    /// Banner invisible.
    Hidden,
    /// Banner visible with a message (possibly empty).
    Shown {
        /// Banner text.
        message: &'static str,
    },
}

/// Pure banner transition: the next state depends only on the latest verdict.
pub fn next_alert_state(is_infraction: bool, kind: Option<&InfractionType>) -> AlertState {
    if is_infraction {
        AlertState::Shown {
            message: alert_message(kind),
        }
    } else {
        AlertState::Hidden
    }
}

/// Level-latched infraction banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertBanner {
    state: AlertState,
}

impl AlertBanner {
    /// Creates a hidden banner.
    pub fn new() -> Self {
        Self {
            state: AlertState::Hidden,
        }
    }

    /// Applies one verdict.
    ///
    /// # Returns
    /// The message to log as a violation when the banner is shown, `None` when
    /// it is hidden.
    pub fn update(
        &mut self,
        is_infraction: bool,
        kind: Option<&InfractionType>,
    ) -> Option<&'static str> {
        self.state = next_alert_state(is_infraction, kind);
        match self.state {
            AlertState::Shown { message } => Some(message),
            AlertState::Hidden => None,
        }
    }

    /// Current state.
    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Returns `true` while the banner is shown.
    pub fn is_visible(&self) -> bool {
        matches!(self.state, AlertState::Shown { .. })
    }

    /// Banner text; empty while hidden.
    pub fn message(&self) -> &'static str {
        match self.state {
            AlertState::Shown { message } => message,
            AlertState::Hidden => "",
        }
    }
}

impl Default for AlertBanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Global status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    /// Session started, no verdict yet.
    Initializing,
    /// Latest verdict is clean.
    Monitoring,
    /// Latest verdict is an infraction.
    InfractionDetected,
    /// Camera could not be acquired.
    CameraError,
    /// Capture turned off by configuration.
    CaptureDisabled,
}

impl StatusLabel {
    /// Status text.
    pub fn text(self) -> &'static str {
        match self {
            StatusLabel::Initializing => "Initializing",
            StatusLabel::Monitoring => "Monitoring",
            StatusLabel::InfractionDetected => "Infraction Detected",
            StatusLabel::CameraError => "Camera Error",
            StatusLabel::CaptureDisabled => "Capture Disabled",
        }
    }

    /// Status text color.
    pub fn tone(self) -> Tone {
        match self {
            StatusLabel::InfractionDetected | StatusLabel::CameraError => Tone::Danger,
            StatusLabel::CaptureDisabled => Tone::Warning,
            StatusLabel::Initializing | StatusLabel::Monitoring => Tone::Secondary,
        }
    }
}

/// Formats a wall-clock stamp at `HH:MM:SS` precision.
pub fn clock_stamp(at: OffsetDateTime) -> String {
    format!("{:02}:{:02}:{:02}", at.hour(), at.minute(), at.second())
}

/// Current local time, falling back to UTC when the offset is unknown.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Bounded newest-first event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    /// Creates a log holding at most 20 entries.
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    /// Creates a log with a custom bound (at least one entry).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Appends a message stamped with the current local time.
    pub fn append(&mut self, message: impl Into<String>, severity: LogSeverity) -> &LogEntry {
        self.append_at(message, severity, local_now())
    }

    /// Appends a message stamped with `at`.
    pub fn append_at(
        &mut self,
        message: impl Into<String>,
        severity: LogSeverity,
        at: OffsetDateTime,
    ) -> &LogEntry {
        self.push(LogEntry::new(clock_stamp(at), message, severity))
    }

    /// Inserts a prepared entry at the front, evicting the oldest past capacity.
    pub fn push(&mut self, entry: LogEntry) -> &LogEntry {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection badge driven only by channel lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionIndicator {
    state: ConnectionState,
}

impl ConnectionIndicator {
    /// Starts in [`ConnectionState::Connecting`].
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
        }
    }

    /// Applies a lifecycle event. Returns `true` when the state changed.
    pub fn apply(&mut self, state: ConnectionState) -> bool {
        let changed = self.state != state;
        self.state = state;
        changed
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Badge text.
    pub fn badge(&self) -> &'static str {
        match self.state {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Live",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    /// Badge background tone.
    pub fn tone(&self) -> Tone {
        match self.state {
            ConnectionState::Connecting => Tone::Secondary,
            ConnectionState::Connected => Tone::Success,
            ConnectionState::Disconnected => Tone::Danger,
        }
    }
}

impl Default for ConnectionIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic stage status used for the capture subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage encountered a terminal or repeated error.
    Degraded,
}

/// Visible effects of one verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictEffects {
    /// Band of the new score.
    pub band: GaugeBand,
    /// Banner state after the verdict.
    pub alert: AlertState,
    /// Violation entry appended to the log, if any.
    pub logged: Option<LogEntry>,
}

/// Aggregate, renderer-independent session view state.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// App version string.
    pub version: String,
    /// Trust gauge.
    pub gauge: TrustGauge,
    /// Infraction banner.
    pub banner: AlertBanner,
    /// Global status line.
    pub status: StatusLabel,
    /// Face count of the latest verdict.
    pub face_count: Option<u32>,
    /// Connection badge.
    pub connection: ConnectionIndicator,
    /// Event log.
    pub log: EventLog,
    /// Capture subsystem status.
    pub capture: StageStatus,
}

impl UiState {
    /// Creates the initial state.
    pub fn new(version: impl Into<String>) -> Self {
        Self::with_gauge(version, TrustGauge::default())
    }

    /// Creates the initial state with a custom gauge.
    pub fn with_gauge(version: impl Into<String>, gauge: TrustGauge) -> Self {
        Self {
            version: version.into(),
            gauge,
            banner: AlertBanner::new(),
            status: StatusLabel::Initializing,
            face_count: None,
            connection: ConnectionIndicator::new(),
            log: EventLog::new(),
            capture: StageStatus::Idle,
        }
    }

    /// Renders one verdict, stamping any log entry with local time.
    pub fn apply_verdict(&mut self, result: &ProctorResult) -> VerdictEffects {
        self.apply_verdict_at(result, local_now())
    }

    /// Renders one verdict; the latest verdict overwrites all verdict-driven
    /// regions.
    pub fn apply_verdict_at(
        &mut self,
        result: &ProctorResult,
        at: OffsetDateTime,
    ) -> VerdictEffects {
        self.gauge.set_score(result.trust_score);
        self.face_count = Some(result.face_count);

        let logged = match self
            .banner
            .update(result.is_infraction, result.effective_infraction())
        {
            Some(message) => {
                self.status = StatusLabel::InfractionDetected;
                Some(
                    self.log
                        .append_at(message, LogSeverity::Violation, at)
                        .clone(),
                )
            }
            None => {
                self.status = StatusLabel::Monitoring;
                None
            }
        };

        VerdictEffects {
            band: self.gauge.band(),
            alert: self.banner.state().clone(),
            logged,
        }
    }

    /// Applies a channel lifecycle change, logging it when the badge changes.
    pub fn apply_connection_at(&mut self, state: ConnectionState, at: OffsetDateTime) -> bool {
        if !self.connection.apply(state) {
            return false;
        }

        let message = match state {
            ConnectionState::Connected => "Connected to analyzer",
            ConnectionState::Disconnected => "Disconnected from analyzer",
            ConnectionState::Connecting => "Connecting to analyzer",
        };
        self.log.append_at(message, LogSeverity::Informational, at);
        true
    }

    /// Records a terminal camera failure.
    pub fn report_camera_error_at(&mut self, detail: &str, at: OffsetDateTime) {
        self.status = StatusLabel::CameraError;
        self.capture = StageStatus::Degraded;
        self.log
            .append_at(format!("Camera Error: {detail}"), LogSeverity::Informational, at);
    }

    /// Records that capture was disabled by configuration.
    pub fn report_capture_disabled(&mut self) {
        self.status = StatusLabel::CaptureDisabled;
        self.capture = StageStatus::Idle;
    }
}

/// One rendered log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// `[HH:MM:SS] message`.
    pub text: String,
    /// Whether the line is styled as a violation.
    pub violation: bool,
}

/// Flat values for every addressable UI region.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    /// Trust score label, e.g. `42%`.
    pub trust_label: String,
    /// Gauge dash offset.
    pub gauge_offset: f64,
    /// Gauge circumference (dash array).
    pub gauge_circumference: f64,
    /// Gauge stroke tone.
    pub gauge_tone: Tone,
    /// Whether the alert overlay is visible.
    pub alert_visible: bool,
    /// Alert overlay text.
    pub alert_message: String,
    /// Status line text.
    pub status_text: String,
    /// Status line tone.
    pub status_tone: Tone,
    /// Face count label, e.g. `Faces: 2`.
    pub face_count_label: String,
    /// Connection badge text.
    pub connection_badge: String,
    /// Connection badge tone.
    pub connection_tone: Tone,
    /// Log lines, newest first.
    pub log_lines: Vec<LogLine>,
    /// Capture subsystem status.
    pub capture: StageStatus,
}

/// Projects session state into renderable values.
pub fn project_view(state: &UiState) -> ViewSnapshot {
    ViewSnapshot {
        trust_label: state.gauge.label(),
        gauge_offset: state.gauge.offset(),
        gauge_circumference: state.gauge.circumference(),
        gauge_tone: state.gauge.band().tone(),
        alert_visible: state.banner.is_visible(),
        alert_message: state.banner.message().to_string(),
        status_text: state.status.text().to_string(),
        status_tone: state.status.tone(),
        face_count_label: match state.face_count {
            Some(count) => format!("Faces: {count}"),
            None => "Faces: -".to_string(),
        },
        connection_badge: state.connection.badge().to_string(),
        connection_tone: state.connection.tone(),
        log_lines: state
            .log
            .entries()
            .map(|entry| LogLine {
                text: format!("[{}] {}", entry.timestamp, entry.message),
                violation: entry.severity.is_violation(),
            })
            .collect(),
        capture: state.capture,
    }
}

/// Rendering seam implemented by concrete display technologies.
pub trait UiSurface {
    /// Draws one snapshot.
    fn render(&mut self, view: &ViewSnapshot);
}

/// Surface that keeps every rendered snapshot; useful in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    frames: Vec<ViewSnapshot>,
}

impl RecordingSurface {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot rendered so far.
    pub fn frames(&self) -> &[ViewSnapshot] {
        &self.frames
    }

    /// Most recent snapshot.
    pub fn last(&self) -> Option<&ViewSnapshot> {
        self.frames.last()
    }
}

impl UiSurface for RecordingSurface {
    fn render(&mut self, view: &ViewSnapshot) {
        self.frames.push(view.clone());
    }
}
