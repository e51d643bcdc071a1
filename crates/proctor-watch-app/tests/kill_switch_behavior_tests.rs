//! Integration tests for runtime kill-switch behavior.

use proctor_watch_app::{CAPTURE_ENABLED_ENV, capture_enabled_from_env};

#[test]
fn kill_switch_behavior_tests_disables_capture_when_env_is_off() {
    // Safety:
    // - This is the only test in this binary touching the process env.
    // - The variable is removed before returning.
    unsafe { std::env::set_var(CAPTURE_ENABLED_ENV, "off") };
    assert!(!capture_enabled_from_env());

    // Safety: see above.
    unsafe { std::env::set_var(CAPTURE_ENABLED_ENV, "1") };
    assert!(capture_enabled_from_env());

    // Safety: see above.
    unsafe { std::env::remove_var(CAPTURE_ENABLED_ENV) };
    assert!(capture_enabled_from_env());
}
