#![warn(missing_docs)]
//! # proctor-watch-capture
//!
//! ## Purpose
//! Owns the camera for one session and samples it on a fixed cadence.
//!
//! ## Responsibilities
//! - Define backend-agnostic camera acquisition and frame reading traits.
//! - Expose a deterministic synthetic camera for CI and demos, and a native
//!   webcam provider behind the `webcam` feature.
//! - Drive a latest-only capture timer (400 ms by default).
//! - Rasterize and encode each sampled frame into a `video_frame` payload.
//!
//! ## Data flow
//! [`CameraProvider::acquire`] -> [`FrameCaptureLoop::poll`] on every loop
//! turn -> ready check -> [`Canvas`] draw -> JPEG data URL ->
//! [`VideoFramePayload`] handed to the caller for sending.
//!
//! ## Ownership and lifetimes
//! The capture loop exclusively owns the camera device for the session. Frames
//! live for one tick only; payloads are owned and handed off by value.
//!
//! ## Error model
//! Acquisition failures are [`MediaAccessError`] and are terminal for the
//! capture subsystem. Per-tick failures are [`CaptureError`] and only cost
//! the current tick. A camera that is not ready yet is not an error.

use proctor_watch_core::{CAPTURE_PERIOD_MS, FRAME_JPEG_QUALITY, Frame, VideoFramePayload};
use proctor_watch_encode::{Canvas, EncodeError, frame_payload};
use thiserror::Error;
use tracing::{debug, warn};

/// Requested camera geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    /// Ideal width in pixels.
    pub width: u32,
    /// Ideal height in pixels.
    pub height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Metadata describing an acquired camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Human-readable device label.
    pub label: String,
    /// Native frame width in pixels.
    pub width: u32,
    /// Native frame height in pixels.
    pub height: u32,
}

/// Buffering state of the video source, ordered from least to most ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// No information about the source yet.
    HaveNothing,
    /// Dimensions known, no frame data.
    HaveMetadata,
    /// Data for the current position only.
    HaveCurrentData,
    /// Data for the current position and a little ahead.
    HaveFutureData,
    /// Enough data buffered to sample reliably.
    HaveEnoughData,
}

/// An acquired camera, exclusively owned by one capture loop.
///
/// Devices stay on the thread that acquired them, so no `Send` bound.
pub trait CameraDevice {
    /// Device metadata, including native frame size.
    fn info(&self) -> &CameraInfo;

    /// Polls the current buffering state.
    fn ready_state(&mut self) -> ReadyState;

    /// Reads the current video image.
    ///
    /// # Errors
    /// Returns [`CaptureError::Device`] when the device cannot produce a frame.
    fn read_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError>;
}

/// Grants access to a camera device.
pub trait CameraProvider: Send + Sync {
    /// Acquires the camera once for the session.
    ///
    /// # Errors
    /// Returns [`MediaAccessError`] when permission is denied or no usable
    /// device exists.
    fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, MediaAccessError>;
}

/// Access outcome simulated by [`SyntheticCameraProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticAccess {
    /// Camera is granted.
    Granted,
    /// User refused camera permission.
    PermissionDenied,
    /// No camera device present.
    NoDevice,
}

/// Deterministic camera provider for tests and demo sessions.
#[derive(Debug, Clone)]
pub struct SyntheticCameraProvider {
    access: SyntheticAccess,
    native_size: Option<(u32, u32)>,
    warmup_polls: Option<u32>,
}

impl SyntheticCameraProvider {
    /// Creates a provider whose camera is ready on the first poll.
    pub fn new() -> Self {
        Self {
            access: SyntheticAccess::Granted,
            native_size: None,
            warmup_polls: Some(0),
        }
    }

    /// Camera reports `HaveEnoughData` only after `polls` not-ready polls.
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = Some(polls);
        self
    }

    /// Camera never buffers enough data to be sampled.
    pub fn never_ready(mut self) -> Self {
        self.warmup_polls = None;
        self
    }

    /// Overrides the native frame size (defaults to the requested constraints).
    pub fn with_native_size(mut self, width: u32, height: u32) -> Self {
        self.native_size = Some((width, height));
        self
    }

    /// Provider that refuses access.
    pub fn denied() -> Self {
        Self {
            access: SyntheticAccess::PermissionDenied,
            ..Self::new()
        }
    }

    /// Provider with no camera attached.
    pub fn unavailable() -> Self {
        Self {
            access: SyntheticAccess::NoDevice,
            ..Self::new()
        }
    }
}

impl Default for SyntheticCameraProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraProvider for SyntheticCameraProvider {
    fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, MediaAccessError> {
        match self.access {
            SyntheticAccess::PermissionDenied => return Err(MediaAccessError::PermissionDenied),
            SyntheticAccess::NoDevice => {
                return Err(MediaAccessError::DeviceUnavailable(
                    "no synthetic camera attached".to_string(),
                ));
            }
            SyntheticAccess::Granted => {}
        }

        let (width, height) = self
            .native_size
            .unwrap_or((constraints.width, constraints.height));
        if width == 0 || height == 0 {
            return Err(MediaAccessError::DeviceUnavailable(format!(
                "unsupported camera geometry {width}x{height}"
            )));
        }

        Ok(Box::new(SyntheticCamera {
            info: CameraInfo {
                label: "Synthetic Camera".to_string(),
                width,
                height,
            },
            warmup_polls: self.warmup_polls,
            polls: 0,
            sequence: 0,
        }))
    }
}

#[derive(Debug)]
struct SyntheticCamera {
    info: CameraInfo,
    warmup_polls: Option<u32>,
    polls: u32,
    sequence: u64,
}

impl CameraDevice for SyntheticCamera {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn ready_state(&mut self) -> ReadyState {
        let Some(warmup) = self.warmup_polls else {
            return ReadyState::HaveMetadata;
        };

        if self.polls >= warmup {
            ReadyState::HaveEnoughData
        } else {
            self.polls += 1;
            ReadyState::HaveCurrentData
        }
    }

    fn read_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        self.sequence += 1;
        let byte = (self.sequence % 255) as u8;
        let rgba_len = (self.info.width as usize) * (self.info.height as usize) * 4;

        Frame::new(
            self.info.width,
            self.info.height,
            captured_at_ms,
            vec![byte; rgba_len],
        )
        .map_err(|error| CaptureError::Device(error.to_string()))
    }
}

/// Maps a platform camera failure message onto [`MediaAccessError`].
///
/// Messages mentioning permission or authorization become
/// [`MediaAccessError::PermissionDenied`]; anything else is treated as an
/// unusable device.
pub fn classify_camera_failure(detail: &str) -> MediaAccessError {
    let normalized = detail.to_ascii_lowercase();
    let refused = ["permission", "denied", "not authorized", "unauthorized"]
        .iter()
        .any(|marker| normalized.contains(marker));

    if refused {
        MediaAccessError::PermissionDenied
    } else {
        MediaAccessError::DeviceUnavailable(detail.to_string())
    }
}

/// Native webcam provider backed by `nokhwa`.
///
/// # Notes
/// Requests the closest MJPEG format to the constraints and decodes frames to
/// RGBA. Devices whose stream is not open report [`ReadyState::HaveNothing`].
#[cfg(feature = "webcam")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WebcamProvider {
    index: u32,
}

#[cfg(feature = "webcam")]
impl WebcamProvider {
    /// Provider for the camera at `index` in the platform's device list.
    pub fn new(index: u32) -> Self {
        Self { index }
    }
}

#[cfg(feature = "webcam")]
impl CameraProvider for WebcamProvider {
    fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, MediaAccessError> {
        use nokhwa::pixel_format::RgbAFormat;
        use nokhwa::utils::{
            CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
            Resolution,
        };

        let wanted = CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            30,
        );
        let requested =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = nokhwa::Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|error| classify_camera_failure(&error.to_string()))?;
        camera
            .open_stream()
            .map_err(|error| classify_camera_failure(&error.to_string()))?;

        let resolution = camera.resolution();
        let info = CameraInfo {
            label: camera.info().human_name(),
            width: resolution.width(),
            height: resolution.height(),
        };
        if info.width == 0 || info.height == 0 {
            return Err(MediaAccessError::DeviceUnavailable(format!(
                "camera reported geometry {}x{}",
                info.width, info.height
            )));
        }

        Ok(Box::new(Webcam { camera, info }))
    }
}

#[cfg(feature = "webcam")]
struct Webcam {
    camera: nokhwa::Camera,
    info: CameraInfo,
}

#[cfg(feature = "webcam")]
impl CameraDevice for Webcam {
    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn ready_state(&mut self) -> ReadyState {
        if self.camera.is_stream_open() {
            ReadyState::HaveEnoughData
        } else {
            ReadyState::HaveNothing
        }
    }

    fn read_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        use nokhwa::pixel_format::RgbAFormat;

        let buffer = self
            .camera
            .frame()
            .map_err(|error| CaptureError::Device(error.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbAFormat>()
            .map_err(|error| CaptureError::Device(error.to_string()))?;
        let (width, height) = decoded.dimensions();

        Frame::new(width, height, captured_at_ms, decoded.into_raw())
            .map_err(|error| CaptureError::Device(error.to_string()))
    }
}

/// Capture cadence and encoding settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    period_ms: u64,
    quality: f32,
}

impl CaptureConfig {
    /// Creates a validated config with the fixed JPEG quality.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidPeriod`] when `period_ms == 0`.
    pub fn new(period_ms: u64) -> Result<Self, CaptureError> {
        if period_ms == 0 {
            return Err(CaptureError::InvalidPeriod);
        }
        Ok(Self {
            period_ms,
            quality: FRAME_JPEG_QUALITY,
        })
    }

    /// Returns the capture period in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.period_ms
    }

    /// Returns the JPEG quality on the `0.0..=1.0` scale.
    pub fn quality(&self) -> f32 {
        self.quality
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            period_ms: CAPTURE_PERIOD_MS,
            quality: FRAME_JPEG_QUALITY,
        }
    }
}

/// Fixed-period repeating timer.
///
/// The first tick is due one period after start. A poll that arrives late
/// fires once and skips every tick it missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimer {
    period_ms: u64,
    next_due_ms: u64,
}

impl CaptureTimer {
    /// Starts a timer at `started_at_ms`.
    pub fn new(config: CaptureConfig, started_at_ms: u64) -> Self {
        Self {
            period_ms: config.interval_ms(),
            next_due_ms: started_at_ms.saturating_add(config.interval_ms()),
        }
    }

    /// Returns `true` when a tick is due at `now_ms` and schedules the next one.
    pub fn fire(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_due_ms {
            return false;
        }

        let missed = (now_ms - self.next_due_ms) / self.period_ms;
        self.next_due_ms = self
            .next_due_ms
            .saturating_add(self.period_ms.saturating_mul(missed + 1));
        true
    }

    /// Milliseconds until the next tick is due.
    pub fn until_next_ms(&self, now_ms: u64) -> u64 {
        self.next_due_ms.saturating_sub(now_ms)
    }

    /// Absolute time of the next tick.
    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }
}

/// Counters describing capture loop activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Timer ticks handled.
    pub ticks: u64,
    /// Ticks skipped because the source was not ready.
    pub skipped_not_ready: u64,
    /// Frames encoded and handed off.
    pub frames_encoded: u64,
    /// Ticks lost to device or encoder failures.
    pub failures: u64,
}

/// Best-effort, latest-only frame sampler.
pub struct FrameCaptureLoop {
    device: Box<dyn CameraDevice>,
    canvas: Canvas,
    timer: CaptureTimer,
    config: CaptureConfig,
    stats: CaptureStats,
}

impl FrameCaptureLoop {
    /// Acquires the camera and starts the capture timer.
    ///
    /// # Errors
    /// Returns [`MediaAccessError`] when the camera cannot be acquired.
    pub fn start(
        provider: &dyn CameraProvider,
        constraints: &CameraConstraints,
        config: CaptureConfig,
        now_ms: u64,
    ) -> Result<Self, MediaAccessError> {
        let device = provider.acquire(constraints)?;
        debug!(
            camera = %device.info().label,
            width = device.info().width,
            height = device.info().height,
            period_ms = config.interval_ms(),
            "camera acquired"
        );

        Ok(Self {
            device,
            canvas: Canvas::new(),
            timer: CaptureTimer::new(config, now_ms),
            config,
            stats: CaptureStats::default(),
        })
    }

    /// Runs a tick if one is due at `now_ms`.
    ///
    /// # Returns
    /// - `Ok(Some(payload))` when a frame was sampled and encoded.
    /// - `Ok(None)` when no tick was due or the source was not ready.
    ///
    /// # Errors
    /// Returns [`CaptureError`] when the due tick failed; the loop stays usable.
    pub fn poll(&mut self, now_ms: u64) -> Result<Option<VideoFramePayload>, CaptureError> {
        if !self.timer.fire(now_ms) {
            return Ok(None);
        }
        self.tick(now_ms)
    }

    /// Runs one tick immediately, regardless of the timer.
    ///
    /// # Errors
    /// Returns [`CaptureError`] on device or encoder failure.
    pub fn tick(&mut self, now_ms: u64) -> Result<Option<VideoFramePayload>, CaptureError> {
        self.stats.ticks += 1;

        let ready_state = self.device.ready_state();
        if ready_state != ReadyState::HaveEnoughData {
            self.stats.skipped_not_ready += 1;
            debug!(?ready_state, now_ms, "capture tick skipped");
            return Ok(None);
        }

        match self.sample(now_ms) {
            Ok(payload) => {
                self.stats.frames_encoded += 1;
                Ok(Some(payload))
            }
            Err(error) => {
                self.stats.failures += 1;
                warn!(%error, now_ms, "capture tick failed");
                Err(error)
            }
        }
    }

    fn sample(&mut self, now_ms: u64) -> Result<VideoFramePayload, CaptureError> {
        let (width, height) = (self.device.info().width, self.device.info().height);
        self.canvas.resize(width, height);

        let frame = self.device.read_frame(now_ms)?;
        self.canvas.draw_frame(&frame)?;
        let encoded = self.canvas.encode_jpeg(self.config.quality(), frame.captured_at_ms)?;
        Ok(frame_payload(&encoded))
    }

    /// Milliseconds until the next tick is due.
    pub fn until_next_tick_ms(&self, now_ms: u64) -> u64 {
        self.timer.until_next_ms(now_ms)
    }

    /// Acquired camera metadata.
    pub fn camera(&self) -> &CameraInfo {
        self.device.info()
    }

    /// Activity counters.
    pub fn stats(&self) -> CaptureStats {
        self.stats
    }
}

/// Camera acquisition failure; terminal for the capture subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaAccessError {
    /// User or policy refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No usable camera device.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Per-tick capture failure.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture period must be positive.
    #[error("invalid capture period: must be greater than zero")]
    InvalidPeriod,
    /// Device failed to produce a frame.
    #[error("camera device failure: {0}")]
    Device(String),
    /// Rasterization or encoding failed.
    #[error("frame encoding failure: {0}")]
    Encode(#[from] EncodeError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for timer cadence and synthetic camera behavior.

    use super::*;

    #[test]
    fn timer_skips_missed_ticks() {
        let mut timer = CaptureTimer::new(CaptureConfig::default(), 0);
        assert!(!timer.fire(399));
        assert!(timer.fire(400));
        assert!(!timer.fire(401));
        assert!(timer.fire(1_250));
        assert_eq!(timer.next_due_ms(), 1_600);
    }

    #[test]
    fn camera_failures_map_to_media_errors() {
        assert_eq!(
            classify_camera_failure("Could not open device: Permission denied (os error 13)"),
            MediaAccessError::PermissionDenied
        );
        assert_eq!(
            classify_camera_failure("camera access not authorized"),
            MediaAccessError::PermissionDenied
        );
        assert_eq!(
            classify_camera_failure("No such device: index 0"),
            MediaAccessError::DeviceUnavailable("No such device: index 0".to_string())
        );
    }

    #[test]
    fn synthetic_camera_warms_up() {
        let provider = SyntheticCameraProvider::new()
            .with_warmup(2)
            .with_native_size(4, 4);
        let mut device = provider
            .acquire(&CameraConstraints::default())
            .expect("camera should be granted");

        assert_eq!(device.ready_state(), ReadyState::HaveCurrentData);
        assert_eq!(device.ready_state(), ReadyState::HaveCurrentData);
        assert_eq!(device.ready_state(), ReadyState::HaveEnoughData);

        let frame = device.read_frame(42).expect("frame should be read");
        assert_eq!((frame.width, frame.height), (4, 4));
        assert_eq!(frame.captured_at_ms, 42);
    }
}
