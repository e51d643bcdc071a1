#![warn(missing_docs)]
//! # proctor-watch-app binary
//!
//! Terminal demo: the camera streams to the in-process loopback analyzer and
//! every view change is printed as a status line. Builds with the `webcam`
//! feature open a real device; other builds use the synthetic camera.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use proctor_watch_app::{LOG_ENV, MonitorConfig, SessionRuntime, TerminalSurface, app_version};
use proctor_watch_capture::CameraProvider;
use proctor_watch_loopback::LoopbackAnalyzer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(feature = "webcam")]
fn camera_provider(config: &MonitorConfig) -> Box<dyn CameraProvider> {
    Box::new(proctor_watch_capture::WebcamProvider::new(config.camera_index))
}

#[cfg(not(feature = "webcam"))]
fn camera_provider(_config: &MonitorConfig) -> Box<dyn CameraProvider> {
    Box::new(proctor_watch_capture::SyntheticCameraProvider::new().with_warmup(2))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// CLI entry point.
fn main() {
    init_tracing();

    let config = MonitorConfig::from_env();
    tracing::info!(
        version = app_version(),
        endpoint = %config.endpoint,
        capture_enabled = config.capture_enabled,
        session_secs = config.session_secs,
        "proctor-watch starting"
    );

    let camera = camera_provider(&config);
    let analyzer = Arc::new(LoopbackAnalyzer::default());

    let mut runtime = match SessionRuntime::start(
        &config,
        camera.as_ref(),
        analyzer,
        TerminalSurface::new(std::io::stdout()),
        unix_now_ms(),
    ) {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "failed to start session");
            std::process::exit(1);
        }
    };

    runtime.run_for(config.session_length());
}
