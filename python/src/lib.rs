//! Python extension module `_eaf`.
//!
//! Exposes the focuser adapter as the class `EAF` with the camelCase method
//! names Python hosts already use:
//!
//! ```python
//! from _eaf import EAF
//!
//! eaf = EAF(device_number=0, backlash=20)
//! if eaf.connect():
//!     eaf.move(15000)
//!     while eaf.isMoving():
//!         time.sleep(0.5)
//!     print(eaf.getPosition())
//!     eaf.disconnect()
//! ```
//!
//! Failures come back as sentinels (`-1`, `False`, `nan`), never as
//! exceptions.

use eaf_focuser::{default_driver, Focuser, FocuserConfig};
use pyo3::prelude::*;

/// ZWO EAF focuser.
#[pyclass(name = "EAF", module = "_eaf")]
struct PyEaf {
    inner: Focuser,
}

#[pymethods]
impl PyEaf {
    #[new]
    #[pyo3(signature = (device_number=0, max_steps=60000, backlash=0, direction=false, sound=true))]
    fn new(device_number: i32, max_steps: i32, backlash: i32, direction: bool, sound: bool) -> Self {
        let config = FocuserConfig {
            device_number,
            max_steps,
            backlash,
            direction,
            sound,
        };
        Self {
            inner: Focuser::new(default_driver(), config),
        }
    }

    /// Connect to the device at `device_number`, or the configured one.
    #[pyo3(signature = (device_number=None))]
    fn connect(&mut self, py: Python<'_>, device_number: Option<i32>) -> bool {
        let inner = &mut self.inner;
        py.allow_threads(|| match device_number {
            Some(index) => inner.connect(index),
            None => inner.connect_configured(),
        })
    }

    fn disconnect(&mut self) -> bool {
        self.inner.disconnect()
    }

    #[pyo3(name = "getMaximalStep")]
    fn maximal_step(&mut self) -> i32 {
        self.inner.maximal_step()
    }

    #[pyo3(name = "setMaximalStep")]
    fn set_maximal_step(&mut self, steps: i32) {
        self.inner.set_maximal_step(steps);
    }

    #[pyo3(name = "getBacklash")]
    fn backlash(&mut self) -> i32 {
        self.inner.backlash()
    }

    #[pyo3(name = "setBacklash")]
    fn set_backlash(&mut self, steps: i32) {
        self.inner.set_backlash(steps);
    }

    #[pyo3(name = "getDirection")]
    fn direction(&mut self) -> bool {
        self.inner.direction()
    }

    #[pyo3(name = "setDirection")]
    fn set_direction(&mut self, reversed: bool) {
        self.inner.set_direction(reversed);
    }

    #[pyo3(name = "getSound")]
    fn sound(&mut self) -> bool {
        self.inner.sound()
    }

    #[pyo3(name = "setSound")]
    fn set_sound(&mut self, enabled: bool) {
        self.inner.set_sound(enabled);
    }

    /// Temperature in °C, `nan` when it cannot be read.
    #[pyo3(name = "getTemperature")]
    fn temperature(&self) -> f32 {
        self.inner.temperature()
    }

    #[pyo3(name = "isMoving")]
    fn is_moving(&self) -> bool {
        self.inner.is_moving()
    }

    #[pyo3(name = "getPosition")]
    fn position(&self) -> i32 {
        self.inner.position()
    }

    /// Overwrite the position counter without moving.
    #[pyo3(name = "resetPosition")]
    fn reset_position(&mut self, step: i32) {
        self.inner.reset_position(step);
    }

    /// Hardware step range, `-1` while moving.
    #[pyo3(name = "getStepRange")]
    fn step_range(&self) -> i32 {
        self.inner.step_range()
    }

    /// Start a move to `position`. `False` if already moving or refused.
    #[pyo3(name = "move")]
    fn move_to(&mut self, position: i32) -> bool {
        self.inner.move_to(position)
    }

    fn stop(&mut self) -> bool {
        self.inner.stop()
    }

    #[pyo3(name = "getSdkVersion")]
    fn sdk_version(&self) -> String {
        self.inner.sdk_version()
    }

    #[pyo3(name = "getFirmwareVersion")]
    fn firmware_version(&self) -> Option<String> {
        self.inner.firmware_version().map(|v| v.to_string())
    }

    #[pyo3(name = "getSerialNumber")]
    fn serial_number(&self) -> Option<String> {
        self.inner.serial_number()
    }

    fn __repr__(&self) -> String {
        let config = self.inner.config();
        match self.inner.handle() {
            Some(id) => format!("EAF(device_number={}, id={})", config.device_number, id),
            None => format!("EAF(device_number={}, disconnected)", config.device_number),
        }
    }
}

#[pymodule]
fn _eaf(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEaf>()?;
    Ok(())
}

#[cfg(all(test, not(feature = "sdk")))]
mod tests {
    use super::*;
    use pyo3::types::PyDict;

    /// Run `code` with the `EAF` class in scope.
    fn run(code: &str) -> PyResult<()> {
        Python::with_gil(|py| {
            let globals = PyDict::new_bound(py);
            globals.set_item("EAF", py.get_type_bound::<PyEaf>())?;
            py.run_bound(code, Some(&globals), None)
        })
    }

    #[test]
    fn test_constructor_defaults() {
        run(r#"
f = EAF()
assert f.connect()
assert f.getMaximalStep() == 60000
assert f.getBacklash() == 0
assert f.getDirection() is False
assert f.getSound() is True
assert f.disconnect()
"#)
        .unwrap();
    }

    #[test]
    fn test_keyword_configuration_is_pushed() {
        run(r#"
f = EAF(max_steps=30000, backlash=12, direction=True, sound=False)
assert f.connect(0)
assert f.getMaximalStep() == 30000
assert f.getBacklash() == 12
assert f.getDirection() is True
assert f.getSound() is False
"#)
        .unwrap();
    }

    #[test]
    fn test_connect_uses_configured_index() {
        run(r#"
f = EAF(device_number=1)
assert f.connect() is False
assert f.connect(None) is False
assert f.connect(0) is True
"#)
        .unwrap();
    }

    #[test]
    fn test_method_table() {
        run(r#"
import math
f = EAF()
assert f.getPosition() == -1
assert math.isnan(f.getTemperature())
assert f.connect()
f.setMaximalStep(45000)
assert f.getMaximalStep() == 45000
f.setBacklash(20)
assert f.getBacklash() == 20
f.setDirection(True)
assert f.getDirection()
f.setSound(False)
assert not f.getSound()
assert f.getTemperature() == 18.5
assert f.getStepRange() == 100000
assert f.move(1500)
assert not f.isMoving()
assert f.getPosition() == 1500
f.resetPosition(300)
assert f.getPosition() == 300
assert f.stop()
assert f.getSdkVersion() == "1.6-mock"
assert f.getFirmwareVersion() == "3.0.0"
assert f.getSerialNumber() == "eaf0000000000001"
assert "id=1" in repr(f)
assert f.disconnect()
assert f.getSerialNumber() is None
"#)
        .unwrap();
    }

    #[test]
    fn test_failed_assertion_surfaces() {
        assert!(run("assert EAF().getPosition() == 0").is_err());
    }
}
