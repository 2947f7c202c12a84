//! End-to-end scripts against the simulated bus.

use std::time::Duration;

use eaf_focuser::{FocusModule, Focuser, FocuserConfig, MockDevice, MockDriver, ModuleConfig};
use eaf_scripting::{focuser_engine, run_script, FocuserHandle, ScriptError};

fn handle(driver: &MockDriver) -> FocuserHandle {
    FocuserHandle::new(Focuser::with_driver(Box::new(driver.clone())))
        .with_poll_interval(Duration::from_millis(1))
}

#[test]
fn test_focus_sweep_script() {
    let driver = MockDriver::new();
    let engine = focuser_engine();

    let script = r#"
        if !focuser.connect(0) { throw "connect failed"; }
        let visited = [];
        for target in [1000, 2000, 3000] {
            focuser.move_to(target);
            visited.push(focuser.wait_idle(1000));
        }
        focuser.disconnect();
        visited
    "#;
    let result = run_script(&engine, handle(&driver), script).unwrap();
    let visited: Vec<i64> = result
        .into_array()
        .unwrap()
        .into_iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    assert_eq!(visited, vec![1000, 2000, 3000]);
    assert!(!driver.is_open(0));
}

#[test]
fn test_script_reads_device_state() {
    let driver = MockDriver::builder()
        .device(MockDevice {
            temperature: 12.5,
            ..Default::default()
        })
        .build();
    let engine = focuser_engine();

    let script = r#"
        focuser.connect(0);
        `${focuser.temperature()} ${focuser.step_range()} ${focuser.sdk_version()}`
    "#;
    let result = run_script(&engine, handle(&driver), script).unwrap();
    assert_eq!(result.into_string().unwrap(), "12.5 100000 1.6-mock");
}

#[test]
fn test_script_shares_adapter_with_module() {
    let driver = MockDriver::new();
    let focuser = Focuser::new(
        Box::new(driver.clone()),
        FocuserConfig {
            backlash: 33,
            ..Default::default()
        },
    );
    let module = FocusModule::new(focuser, ModuleConfig::default());
    module.open().unwrap();

    let engine = focuser_engine();
    let shared = FocuserHandle::from_shared(module.focuser());
    let result = run_script(
        &engine,
        shared,
        "focuser.is_connected() && focuser.backlash() == 33",
    )
    .unwrap();
    assert!(result.as_bool().unwrap());
}

#[test]
fn test_syntax_error_is_reported() {
    let engine = focuser_engine();
    let err = run_script(&engine, handle(&MockDriver::new()), "focuser.connect(").unwrap_err();
    assert!(matches!(err, ScriptError::Eval(_)));
}

#[cfg(not(feature = "sdk"))]
#[test]
fn test_new_focuser_constructor() {
    let engine = focuser_engine();
    let result = engine
        .eval::<bool>("let f = new_focuser(3); f.connect()")
        .unwrap();
    // The default build simulates a single focuser at index 0
    assert!(!result);
}
