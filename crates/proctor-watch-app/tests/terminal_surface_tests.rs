//! Integration tests for the terminal status-line surface.

use std::io::{self, Write};

use proctor_watch_app::TerminalSurface;
use proctor_watch_core::ConnectionState;
use proctor_watch_ui::{UiState, UiSurface, project_view};
use time::OffsetDateTime;

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn terminal_surface_tests_prints_changed_views_once() {
    let mut state = UiState::new("0.1.0");
    let mut surface = TerminalSurface::new(Vec::new());

    surface.render(&project_view(&state));
    surface.render(&project_view(&state));
    state.apply_connection_at(ConnectionState::Connected, OffsetDateTime::UNIX_EPOCH);
    surface.render(&project_view(&state));

    let printed = String::from_utf8(surface.get_ref().clone()).expect("output is utf-8");
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[Connecting] trust 100%"));
    assert!(lines[1].starts_with("[Live] trust 100%"));
    assert_eq!(lines[2], "    [00:00:00] Connected to analyzer");
    assert_eq!(surface.write_failures(), 0);
}

#[test]
fn terminal_surface_tests_write_failure_is_counted_not_fatal() {
    let mut state = UiState::new("0.1.0");
    let mut surface = TerminalSurface::new(BrokenPipe);

    surface.render(&project_view(&state));
    state.apply_connection_at(ConnectionState::Disconnected, OffsetDateTime::UNIX_EPOCH);
    surface.render(&project_view(&state));

    assert_eq!(surface.write_failures(), 2);
}
