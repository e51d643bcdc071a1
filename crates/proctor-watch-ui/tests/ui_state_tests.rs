//! Integration tests for verdict rendering and view projection.

use proctor_watch_core::{ConnectionState, InfractionType, LogSeverity, ProctorResult};
use proctor_watch_ui::{
    AlertState, GaugeBand, RecordingSurface, StageStatus, StatusLabel, Tone, UiState, UiSurface,
    project_view,
};
use time::OffsetDateTime;

fn verdict(score: f64, faces: u32, infraction: Option<&str>) -> ProctorResult {
    ProctorResult {
        trust_score: score,
        face_count: faces,
        is_infraction: infraction.is_some(),
        infraction_type: infraction.map(InfractionType::from),
    }
}

#[test]
fn ui_state_tests_infraction_verdict_updates_every_region() {
    let mut state = UiState::new("0.1.0");
    let effects = state.apply_verdict_at(
        &verdict(42.0, 2, Some("looking_away")),
        OffsetDateTime::UNIX_EPOCH,
    );

    assert_eq!(effects.band, GaugeBand::Danger);
    assert_eq!(
        effects.alert,
        AlertState::Shown {
            message: "Looking Away Detected!"
        }
    );
    let logged = effects.logged.expect("infraction should be logged");
    assert_eq!(logged.severity, LogSeverity::Violation);
    assert_eq!(logged.message, "Looking Away Detected!");

    let view = project_view(&state);
    assert_eq!(view.trust_label, "42%");
    assert_eq!(view.gauge_tone, Tone::Danger);
    assert!(view.alert_visible);
    assert_eq!(view.alert_message, "Looking Away Detected!");
    assert_eq!(view.status_text, "Infraction Detected");
    assert_eq!(view.status_tone, Tone::Danger);
    assert_eq!(view.face_count_label, "Faces: 2");
    assert_eq!(view.log_lines.len(), 1);
    assert_eq!(view.log_lines[0].text, "[00:00:00] Looking Away Detected!");
    assert!(view.log_lines[0].violation);
}

#[test]
fn ui_state_tests_clean_verdict_hides_banner_without_logging() {
    let mut state = UiState::new("0.1.0");
    state.apply_verdict_at(&verdict(70.0, 0, Some("no_face")), OffsetDateTime::UNIX_EPOCH);
    let effects = state.apply_verdict_at(&verdict(85.0, 1, None), OffsetDateTime::UNIX_EPOCH);

    assert_eq!(effects.alert, AlertState::Hidden);
    assert!(effects.logged.is_none());
    assert_eq!(state.status, StatusLabel::Monitoring);
    assert_eq!(state.log.len(), 1);

    let view = project_view(&state);
    assert!(!view.alert_visible);
    assert_eq!(view.status_text, "Monitoring");
    assert_eq!(view.status_tone, Tone::Secondary);
    assert_eq!(view.gauge_tone, Tone::Success);
}

#[test]
fn ui_state_tests_unknown_type_logs_empty_violation() {
    let mut state = UiState::new("0.1.0");
    let effects =
        state.apply_verdict_at(&verdict(60.0, 1, Some("bogus")), OffsetDateTime::UNIX_EPOCH);

    assert_eq!(effects.alert, AlertState::Shown { message: "" });
    assert_eq!(effects.band, GaugeBand::Warning);
    assert_eq!(state.log.latest().map(|entry| entry.message.as_str()), Some(""));
}

#[test]
fn ui_state_tests_connection_changes_are_logged_once() {
    let mut state = UiState::new("0.1.0");
    assert!(state.apply_connection_at(ConnectionState::Connected, OffsetDateTime::UNIX_EPOCH));
    assert!(!state.apply_connection_at(ConnectionState::Connected, OffsetDateTime::UNIX_EPOCH));
    assert!(state.apply_connection_at(ConnectionState::Disconnected, OffsetDateTime::UNIX_EPOCH));

    assert_eq!(state.log.len(), 2);
    let view = project_view(&state);
    assert_eq!(view.connection_badge, "Disconnected");
    assert_eq!(view.connection_tone, Tone::Danger);
    assert!(view.log_lines.iter().all(|line| !line.violation));
}

#[test]
fn ui_state_tests_camera_error_degrades_capture() {
    let mut state = UiState::new("0.1.0");
    state.report_camera_error_at("camera permission denied", OffsetDateTime::UNIX_EPOCH);

    let mut surface = RecordingSurface::new();
    surface.render(&project_view(&state));
    let view = surface.last().expect("snapshot should be recorded");
    assert_eq!(view.status_text, "Camera Error");
    assert_eq!(view.capture, StageStatus::Degraded);
    assert_eq!(view.face_count_label, "Faces: -");
    assert_eq!(view.connection_badge, "Connecting");
}

#[test]
fn ui_state_tests_infraction_without_type_shows_empty_banner() {
    let mut state = UiState::new("0.1.0");
    let untyped = ProctorResult {
        trust_score: 61.0,
        face_count: 1,
        is_infraction: true,
        infraction_type: None,
    };

    let effects = state.apply_verdict_at(&untyped, OffsetDateTime::UNIX_EPOCH);

    assert_eq!(effects.alert, AlertState::Shown { message: "" });
    assert!(state.banner.is_visible());
    assert_eq!(state.banner.message(), "");
    assert_eq!(state.status, StatusLabel::InfractionDetected);
    assert_eq!(state.log.len(), 1);
    let entry = state.log.latest().expect("violation should be logged");
    assert_eq!(entry.severity, LogSeverity::Violation);
    assert_eq!(entry.message, "");

    let view = project_view(&state);
    assert!(view.alert_visible);
    assert_eq!(view.alert_message, "");
    assert_eq!(view.status_text, "Infraction Detected");
}
