//! Adapter contract against the simulated bus.
//!
//! Exercises the public API the way a scripting host does: construct,
//! connect, poll, and read sentinels when things go wrong.

use eaf_focuser::{
    EafError, ErrorScenario, Focuser, FocuserConfig, MockDevice, MockDriver, MockMode, FAILED,
};

fn adapter(driver: &MockDriver) -> Focuser {
    Focuser::new(Box::new(driver.clone()), FocuserConfig::default())
}

#[test]
fn test_unopened_device_reports_failure_sentinels() {
    let driver = MockDriver::builder().devices(2).build();
    let mut focuser = adapter(&driver);

    assert_eq!(focuser.maximal_step(), FAILED);
    assert_eq!(focuser.backlash(), FAILED);
    assert_eq!(focuser.position(), FAILED);
    assert_eq!(focuser.step_range(), FAILED);
    assert!(!focuser.sound());
    assert!(!focuser.direction());
    assert!(!focuser.is_moving());
    assert!(focuser.temperature().is_nan());
    assert!(!focuser.move_to(1));
}

#[test]
fn test_connect_index_must_be_below_count() {
    for count in 1..=3 {
        let driver = MockDriver::builder().devices(count).build();
        let mut focuser = adapter(&driver);
        assert!(!focuser.connect(count as i32), "count {count}");
        assert!(focuser.connect(count as i32 - 1), "count {count}");
    }
}

#[test]
fn test_move_refused_during_motion() {
    let driver = MockDriver::builder()
        .mode(MockMode::Stepped { steps_per_poll: 10 })
        .build();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));

    assert!(focuser.move_to(1000));
    assert!(!focuser.move_to(2000));
    assert_eq!(focuser.step_range(), FAILED);
}

#[test]
fn test_stop_after_move_eventually_idle() {
    let driver = MockDriver::builder()
        .mode(MockMode::Stepped { steps_per_poll: 50 })
        .build();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));

    assert!(focuser.move_to(50_000));
    assert!(focuser.is_moving());
    assert!(focuser.stop());

    let settled = (0..100).any(|_| !focuser.is_moving());
    assert!(settled);
    let stopped_at = focuser.position();
    assert!(stopped_at > 0 && stopped_at < 50_000);
    assert!(focuser.step_range() > 0);
}

#[test]
fn test_maximal_step_round_trip() {
    let driver = MockDriver::builder()
        .device(MockDevice {
            step_range: 80_000,
            ..Default::default()
        })
        .build();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));

    for steps in [1, 12_345, 80_000] {
        focuser.set_maximal_step(steps);
        assert_eq!(focuser.maximal_step(), steps);
    }
}

#[test]
fn test_transient_failure_then_recovery() {
    let driver = MockDriver::builder()
        .scenario(ErrorScenario::FailAfterN {
            operation: "position",
            count: 1,
        })
        .build();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));

    assert_eq!(focuser.position(), 0);
    assert_eq!(focuser.position(), FAILED);
    // Other calls are unaffected
    assert!(focuser.move_to(10));
}

#[test]
fn test_error_state_on_move() {
    let driver = MockDriver::builder()
        .scenario(ErrorScenario::AlwaysFail {
            operation: "move_to",
            error: EafError::ErrorState,
        })
        .build();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));
    assert!(!focuser.move_to(10));
    assert_eq!(driver.motor_target(0), None);
}

#[test]
fn test_disconnect_then_reconnect() {
    let driver = MockDriver::new();
    let mut focuser = adapter(&driver);
    assert!(focuser.connect(0));
    assert!(focuser.move_to(300));
    assert!(focuser.disconnect());
    assert!(!focuser.disconnect());

    assert!(focuser.connect(0));
    assert_eq!(focuser.position(), 300);
}
