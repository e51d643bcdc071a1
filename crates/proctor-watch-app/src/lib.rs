#![warn(missing_docs)]
//! # proctor-watch-app
//!
//! ## Purpose
//! Composition root for `proctor-watch`: wires the camera sampler, the
//! analyzer channel, and the session view state.
//!
//! ## Responsibilities
//! - Read runtime configuration and the capture kill switch from the
//!   environment.
//! - Route channel lifecycle events and verdicts into [`UiState`].
//! - Run the single-threaded cooperative loop that interleaves capture ticks
//!   with inbound channel events.
//! - Print changed views as status lines through [`TerminalSurface`].
//!
//! ## Data flow
//! camera -> [`FrameCaptureLoop`] -> [`ResultChannel::send`] -> analyzer ->
//! [`ChannelEvent`] -> [`SessionController`] -> [`project_view`] ->
//! [`UiSurface`].
//!
//! ## Ownership and lifetimes
//! [`SessionRuntime`] exclusively owns the camera handle, the channel, and the
//! controller for the whole session. Verdicts are consumed on receipt and never
//! stored.
//!
//! ## Error model
//! Only configuration and channel-open failures abort startup ([`AppError`]).
//! Camera access failures degrade capture and are shown on the status line;
//! capture tick failures and malformed verdicts are logged and skipped.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proctor_watch_analysis_contract::{MalformedResultError, VerdictAnomaly, verdict_anomalies};
use proctor_watch_capture::{
    CameraConstraints, CameraProvider, CaptureConfig, CaptureError, FrameCaptureLoop,
    MediaAccessError,
};
use proctor_watch_channel::{ChannelEvent, ChannelTransport, ConnectionError, ResultChannel};
use proctor_watch_core::{CAPTURE_PERIOD_MS, ConnectionState, ProctorResult};
use proctor_watch_ui::{
    StageStatus, UiState, UiSurface, VerdictEffects, ViewSnapshot, local_now, project_view,
};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("PROCTOR_WATCH_VERSION");

/// Analyzer endpoint variable.
pub const ENDPOINT_ENV: &str = "PROCTOR_WATCH_ENDPOINT";
/// Capture period variable, in milliseconds.
pub const CAPTURE_PERIOD_ENV: &str = "PROCTOR_WATCH_CAPTURE_PERIOD_MS";
/// Capture kill-switch variable.
pub const CAPTURE_ENABLED_ENV: &str = "PROCTOR_WATCH_CAPTURE_ENABLED";
/// Demo session length variable, in seconds.
pub const SESSION_SECS_ENV: &str = "PROCTOR_WATCH_SESSION_SECS";
/// Webcam device index variable (used with the `webcam` feature).
pub const CAMERA_INDEX_ENV: &str = "PROCTOR_WATCH_CAMERA_INDEX";
/// Log filter variable.
pub const LOG_ENV: &str = "PROCTOR_WATCH_LOG";

/// Analyzer endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/";
/// Demo session length used when none is configured.
pub const DEFAULT_SESSION_SECS: u64 = 30;

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Runtime configuration for one monitoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Analyzer endpoint URL.
    pub endpoint: String,
    /// Capture timer period.
    pub capture_period_ms: u64,
    /// Kill switch; `false` keeps the camera untouched.
    pub capture_enabled: bool,
    /// How long the demo binary runs.
    pub session_secs: u64,
    /// Requested camera geometry.
    pub camera: CameraConstraints,
    /// Platform device index of the webcam.
    pub camera_index: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capture_period_ms: CAPTURE_PERIOD_MS,
            capture_enabled: true,
            session_secs: DEFAULT_SESSION_SECS,
            camera: CameraConstraints::default(),
            camera_index: 0,
        }
    }
}

impl MonitorConfig {
    /// Reads configuration from process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; unset or unusable values fall
    /// back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let endpoint = lookup(ENDPOINT_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.endpoint);
        let capture_period_ms =
            parse_positive(lookup(CAPTURE_PERIOD_ENV).as_deref(), CAPTURE_PERIOD_ENV)
                .unwrap_or(defaults.capture_period_ms);
        let session_secs = parse_positive(lookup(SESSION_SECS_ENV).as_deref(), SESSION_SECS_ENV)
            .unwrap_or(defaults.session_secs);
        let capture_enabled = capture_enabled_flag(lookup(CAPTURE_ENABLED_ENV).as_deref());
        let camera_index = lookup(CAMERA_INDEX_ENV)
            .and_then(|raw| match raw.trim().parse::<u32>() {
                Ok(index) => Some(index),
                Err(_) => {
                    warn!(key = CAMERA_INDEX_ENV, value = %raw, "ignoring invalid setting");
                    None
                }
            })
            .unwrap_or(defaults.camera_index);

        Self {
            endpoint,
            capture_period_ms,
            capture_enabled,
            session_secs,
            camera: defaults.camera,
            camera_index,
        }
    }

    /// Capture settings derived from this config.
    ///
    /// # Errors
    /// Returns [`AppError::Capture`] when the period is zero.
    pub fn capture_config(&self) -> Result<CaptureConfig, AppError> {
        Ok(CaptureConfig::new(self.capture_period_ms)?)
    }

    /// Demo session length.
    pub fn session_length(&self) -> Duration {
        Duration::from_secs(self.session_secs)
    }
}

fn parse_positive(raw: Option<&str>, key: &str) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!(key, value = raw, "ignoring invalid setting");
            None
        }
    }
}

/// Interprets a kill-switch value.
///
/// Semantics:
/// - Unset => capture enabled.
/// - `0`, `false`, `off` (case-insensitive) => capture disabled.
/// - Any other value => capture enabled.
pub fn capture_enabled_flag(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        None => true,
    }
}

/// Checks runtime kill-switch env var.
pub fn capture_enabled_from_env() -> bool {
    capture_enabled_flag(std::env::var(CAPTURE_ENABLED_ENV).ok().as_deref())
}

/// Per-session activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Verdicts rendered.
    pub verdicts: u64,
    /// Verdicts flagged as infractions.
    pub infractions: u64,
    /// Malformed verdicts dropped.
    pub rejected: u64,
    /// Connect events seen.
    pub connects: u64,
    /// Disconnect events seen.
    pub disconnects: u64,
}

/// Owns session view state and drives it from channel and camera events.
#[derive(Debug, Clone)]
pub struct SessionController {
    ui: UiState,
    counters: SessionCounters,
}

impl SessionController {
    /// Creates a controller in the initial `Initializing` state.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            ui: UiState::new(version),
            counters: SessionCounters::default(),
        }
    }

    /// Applies one channel event stamped with local time.
    ///
    /// # Returns
    /// `true` when visible state changed.
    pub fn handle(&mut self, event: ChannelEvent) -> bool {
        self.handle_at(event, local_now())
    }

    /// Applies one channel event stamped with `at`.
    pub fn handle_at(&mut self, event: ChannelEvent, at: OffsetDateTime) -> bool {
        match event {
            ChannelEvent::Connected => {
                self.counters.connects += 1;
                info!("analyzer connected");
                self.ui.apply_connection_at(ConnectionState::Connected, at)
            }
            ChannelEvent::Disconnected => {
                self.counters.disconnects += 1;
                warn!("analyzer disconnected");
                self.ui.apply_connection_at(ConnectionState::Disconnected, at)
            }
            ChannelEvent::Verdict(result) => {
                self.on_verdict_at(&result, at);
                true
            }
            ChannelEvent::Rejected(error) => {
                self.on_malformed(&error);
                false
            }
        }
    }

    /// Renders one verdict; the latest verdict replaces all verdict-driven
    /// state.
    pub fn on_verdict_at(&mut self, result: &ProctorResult, at: OffsetDateTime) -> VerdictEffects {
        for anomaly in verdict_anomalies(result) {
            match anomaly {
                VerdictAnomaly::TrustScoreOutOfRange(score) => {
                    warn!(score, "trust score outside 0..=100, rendering raw value");
                }
                other => debug!(anomaly = %other, "verdict anomaly"),
            }
        }

        let effects = self.ui.apply_verdict_at(result, at);
        self.counters.verdicts += 1;
        if let Some(entry) = &effects.logged {
            self.counters.infractions += 1;
            info!(
                message = %entry.message,
                trust_score = result.trust_score,
                face_count = result.face_count,
                "infraction shown"
            );
        }
        effects
    }

    /// Counts a dropped verdict; view state is left untouched.
    pub fn on_malformed(&mut self, error: &MalformedResultError) {
        self.counters.rejected += 1;
        debug!(%error, rejected = self.counters.rejected, "verdict dropped");
    }

    /// Surfaces a terminal camera failure on the status line.
    pub fn on_media_error_at(&mut self, failure: &MediaAccessError, at: OffsetDateTime) {
        error!(error = %failure, "camera access failed, continuing without capture");
        self.ui.report_camera_error_at(&failure.to_string(), at);
    }

    /// Marks the capture subsystem as running.
    pub fn on_capture_started(&mut self) {
        self.ui.capture = StageStatus::Running;
    }

    /// Marks capture as disabled by the kill switch.
    pub fn on_capture_disabled(&mut self) {
        warn!(env = CAPTURE_ENABLED_ENV, "capture disabled by kill switch");
        self.ui.report_capture_disabled();
    }

    /// Current view state.
    pub fn state(&self) -> &UiState {
        &self.ui
    }

    /// Session counters.
    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// Projects the current state for rendering.
    pub fn view(&self) -> ViewSnapshot {
        project_view(&self.ui)
    }
}

/// One monitoring session: camera, channel, controller, and surface on a
/// single cooperative loop.
pub struct SessionRuntime<S: UiSurface> {
    controller: SessionController,
    capture: Option<FrameCaptureLoop>,
    channel: ResultChannel,
    surface: S,
    origin: Instant,
    origin_ms: u64,
}

impl<S: UiSurface> SessionRuntime<S> {
    /// Opens the channel, acquires the camera, and renders the initial view.
    ///
    /// A camera failure does not abort startup; the session runs without
    /// capture and keeps rendering verdicts.
    ///
    /// # Errors
    /// Returns [`AppError`] for invalid capture settings or when the channel
    /// cannot be opened.
    pub fn start(
        config: &MonitorConfig,
        camera: &dyn CameraProvider,
        transport: Arc<dyn ChannelTransport>,
        surface: S,
        now_ms: u64,
    ) -> Result<Self, AppError> {
        let capture_config = config.capture_config()?;
        let channel = ResultChannel::open(&config.endpoint, transport)?;
        let mut controller = SessionController::new(app_version());

        let capture = if !config.capture_enabled {
            controller.on_capture_disabled();
            None
        } else {
            match FrameCaptureLoop::start(camera, &config.camera, capture_config, now_ms) {
                Ok(capture) => {
                    info!(
                        camera = %capture.camera().label,
                        period_ms = capture_config.interval_ms(),
                        "capture started"
                    );
                    controller.on_capture_started();
                    Some(capture)
                }
                Err(failure) => {
                    controller.on_media_error_at(&failure, local_now());
                    None
                }
            }
        };

        let mut runtime = Self {
            controller,
            capture,
            channel,
            surface,
            origin: Instant::now(),
            origin_ms: now_ms,
        };
        runtime.render();
        Ok(runtime)
    }

    /// Runs a capture tick if one is due and sends the frame.
    ///
    /// # Returns
    /// `true` when a frame was handed to the channel.
    pub fn on_timer(&mut self, now_ms: u64) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            return false;
        };

        match capture.poll(now_ms) {
            Ok(Some(payload)) => {
                self.channel.send(&payload);
                true
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Drains every pending channel event without blocking.
    ///
    /// # Returns
    /// Number of events handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.channel.try_next_event() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    /// Runs the cooperative loop on wall-clock time for `length`.
    pub fn run_for(&mut self, length: Duration) {
        let deadline = self.origin + length;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let now_ms = self.now_ms(now);
            self.on_timer(now_ms);

            let remaining = deadline.saturating_duration_since(now);
            let wait = match self.capture.as_ref() {
                Some(capture) => {
                    let until_tick = Duration::from_millis(capture.until_next_tick_ms(now_ms));
                    remaining.min(until_tick)
                }
                None => remaining,
            };

            if let Some(event) = self.channel.next_event_timeout(wait) {
                self.dispatch(event);
                self.pump_events();
            }
        }

        let stats = self.channel.stats();
        info!(
            frames_sent = stats.frames_sent,
            verdicts = self.controller.counters().verdicts,
            rejected = self.controller.counters().rejected,
            "session finished"
        );
    }

    fn now_ms(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin).as_millis();
        self.origin_ms
            .saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    fn dispatch(&mut self, event: ChannelEvent) {
        if self.controller.handle(event) {
            self.render();
        }
    }

    fn render(&mut self) {
        let view = self.controller.view();
        self.surface.render(&view);
    }

    /// Session controller.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Analyzer channel.
    pub fn channel(&self) -> &ResultChannel {
        &self.channel
    }

    /// Capture loop, if the camera was acquired.
    pub fn capture(&self) -> Option<&FrameCaptureLoop> {
        self.capture.as_ref()
    }

    /// Rendering surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Writes one status line per changed view, plus the newest log line when
/// it changes. Write failures are logged at `debug!` and counted.
#[derive(Debug)]
pub struct TerminalSurface<W: Write> {
    out: W,
    last: Option<ViewSnapshot>,
    write_failures: u64,
}

impl<W: Write> TerminalSurface<W> {
    /// Creates a surface writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            last: None,
            write_failures: 0,
        }
    }

    /// Renders that could not be written.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn print(&mut self, view: &ViewSnapshot) -> io::Result<()> {
        writeln!(
            self.out,
            "[{}] trust {} ({}) | {} | {} | {}",
            view.connection_badge,
            view.trust_label,
            view.gauge_tone.as_str(),
            view.status_text,
            view.face_count_label,
            if view.alert_visible {
                view.alert_message.as_str()
            } else {
                "no alert"
            },
        )?;

        let previous = self
            .last
            .as_ref()
            .map(|last| last.log_lines.as_slice())
            .unwrap_or(&[]);
        if let Some(newest) = view.log_lines.first()
            && previous.first() != Some(newest)
        {
            let marker = if newest.violation { "!" } else { " " };
            writeln!(self.out, "  {marker} {}", newest.text)?;
        }
        self.out.flush()
    }
}

impl<W: Write> UiSurface for TerminalSurface<W> {
    fn render(&mut self, view: &ViewSnapshot) {
        if self.last.as_ref() == Some(view) {
            return;
        }

        if let Err(error) = self.print(view) {
            self.write_failures += 1;
            debug!(%error, "terminal write failed");
        }
        self.last = Some(view.clone());
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Capture settings error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Analyzer channel error.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}
