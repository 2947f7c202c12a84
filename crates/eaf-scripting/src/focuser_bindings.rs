//! EAF Focuser Bindings for Rhai Scripts
//!
//! Exposes [`Focuser`] to scripts as the type `Focuser`. Methods mirror the
//! adapter one to one and return its sentinels (`-1`, `false`, `NaN`) on
//! failure, so scripts check values the same way Python hosts do. The only
//! call that raises a script error is `wait_idle`, when the motor does not
//! stop in time.
//!
//! # Example Script
//! ```rhai
//! let f = new_focuser();
//! if !f.connect(0) {
//!     throw "no focuser";
//! }
//! f.set_backlash(20);
//! if f.move_to(15000) {
//!     f.wait_idle(60000);
//! }
//! print("Position: " + f.position());
//! f.disconnect();
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use eaf_focuser::{default_driver, Focuser, FocuserConfig};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult};
use tracing::debug;

use crate::rhai_error;

/// Default interval between motion polls in `wait_idle`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn map_error<T, E: std::fmt::Display>(
    label: &str,
    result: Result<T, E>,
) -> Result<T, Box<EvalAltResult>> {
    result.map_err(|e| rhai_error(label, e))
}

/// Saturate a script integer into the SDK's `int` range.
fn to_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Handle to a focuser for Rhai scripts
///
/// Clones share the adapter; each method locks it for one call only.
///
/// # Script Example
/// ```rhai
/// f.move_to(1000);
/// f.wait_idle(30000);
/// ```
#[derive(Clone)]
pub struct FocuserHandle {
    /// Shared adapter
    pub focuser: Arc<Mutex<Focuser>>,
    /// Interval between motion polls in `wait_idle`
    pub poll_interval: Duration,
}

impl FocuserHandle {
    /// Wrap an adapter.
    pub fn new(focuser: Focuser) -> Self {
        Self::from_shared(Arc::new(Mutex::new(focuser)))
    }

    /// Wrap an adapter that other components also use.
    pub fn from_shared(focuser: Arc<Mutex<Focuser>>) -> Self {
        Self {
            focuser,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the `wait_idle` poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Block until the motor reports idle, returning the final position.
    pub fn wait_idle(&self, timeout: Duration) -> Result<i32, String> {
        let started = Instant::now();
        loop {
            if !self.focuser.lock().is_moving() {
                return Ok(self.focuser.lock().position());
            }
            if started.elapsed() >= timeout {
                return Err(format!("focuser did not stop within {:?}", timeout));
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl std::fmt::Debug for FocuserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocuserHandle")
            .field("focuser", &*self.focuser.lock())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Register the `Focuser` type, its methods and the `new_focuser` constructors.
pub fn register_focuser(engine: &mut Engine) {
    engine.register_type_with_name::<FocuserHandle>("Focuser");

    // =========================================================================
    // Constructors
    // =========================================================================

    // new_focuser() - default settings, device 0
    engine.register_fn("new_focuser", || -> FocuserHandle {
        FocuserHandle::new(Focuser::with_driver(default_driver()))
    });

    // new_focuser(device) - configured device index
    engine.register_fn("new_focuser", |device: i64| -> FocuserHandle {
        let config = FocuserConfig {
            device_number: to_i32(device),
            ..Default::default()
        };
        FocuserHandle::new(Focuser::new(default_driver(), config))
    });

    // =========================================================================
    // Connection
    // =========================================================================

    engine.register_fn("connect", |f: &mut FocuserHandle, index: i64| -> bool {
        f.focuser.lock().connect(to_i32(index))
    });

    engine.register_fn("connect", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().connect_configured()
    });

    engine.register_fn("disconnect", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().disconnect()
    });

    engine.register_fn("is_connected", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().is_connected()
    });

    // =========================================================================
    // Settings
    // =========================================================================

    engine.register_fn("maximal_step", |f: &mut FocuserHandle| -> i64 {
        i64::from(f.focuser.lock().maximal_step())
    });

    engine.register_fn("set_maximal_step", |f: &mut FocuserHandle, steps: i64| {
        f.focuser.lock().set_maximal_step(to_i32(steps));
    });

    engine.register_fn("backlash", |f: &mut FocuserHandle| -> i64 {
        i64::from(f.focuser.lock().backlash())
    });

    engine.register_fn("set_backlash", |f: &mut FocuserHandle, steps: i64| {
        f.focuser.lock().set_backlash(to_i32(steps));
    });

    engine.register_fn("direction", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().direction()
    });

    engine.register_fn("set_direction", |f: &mut FocuserHandle, reversed: bool| {
        f.focuser.lock().set_direction(reversed);
    });

    engine.register_fn("sound", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().sound()
    });

    engine.register_fn("set_sound", |f: &mut FocuserHandle, enabled: bool| {
        f.focuser.lock().set_sound(enabled);
    });

    // =========================================================================
    // Readings
    // =========================================================================

    engine.register_fn("temperature", |f: &mut FocuserHandle| -> f64 {
        f64::from(f.focuser.lock().temperature())
    });

    engine.register_fn("is_moving", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().is_moving()
    });

    engine.register_fn("position", |f: &mut FocuserHandle| -> i64 {
        i64::from(f.focuser.lock().position())
    });

    engine.register_fn("reset_position", |f: &mut FocuserHandle, step: i64| {
        f.focuser.lock().reset_position(to_i32(step));
    });

    engine.register_fn("step_range", |f: &mut FocuserHandle| -> i64 {
        i64::from(f.focuser.lock().step_range())
    });

    // =========================================================================
    // Motion
    // =========================================================================

    engine.register_fn("move_to", |f: &mut FocuserHandle, target: i64| -> bool {
        f.focuser.lock().move_to(to_i32(target))
    });

    engine.register_fn("stop", |f: &mut FocuserHandle| -> bool {
        f.focuser.lock().stop()
    });

    // f.wait_idle(timeout_ms) -> final position
    engine.register_fn(
        "wait_idle",
        |f: &mut FocuserHandle, timeout_ms: i64| -> Result<i64, Box<EvalAltResult>> {
            let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
            debug!(?timeout, "Script waiting for focuser to settle");
            let position = map_error("Focuser wait_idle", f.wait_idle(timeout))?;
            Ok(i64::from(position))
        },
    );

    // =========================================================================
    // Identification
    // =========================================================================

    engine.register_fn("sdk_version", |f: &mut FocuserHandle| -> String {
        f.focuser.lock().sdk_version()
    });

    // () when the device cannot be read
    engine.register_fn("firmware_version", |f: &mut FocuserHandle| -> Dynamic {
        f.focuser
            .lock()
            .firmware_version()
            .map_or(Dynamic::UNIT, |v| Dynamic::from(v.to_string()))
    });

    engine.register_fn("serial_number", |f: &mut FocuserHandle| -> Dynamic {
        f.focuser
            .lock()
            .serial_number()
            .map_or(Dynamic::UNIT, Dynamic::from)
    });
}
