//! Simulated EAF bus for testing without hardware.
//!
//! [`MockDriver`] follows the vendor SDK's rules: devices are enumerated by
//! index and addressed by ID, most calls fail with `Closed` until the device
//! is opened, moves are asynchronous and refused while the motor runs.
//!
//! Clones share one bus, so a test can hand a clone to a
//! [`Focuser`](crate::Focuser) and keep another to inspect the simulated
//! device or inject faults.
//!
//! # Example
//!
//! ```
//! use eaf_focuser::{Focuser, FocuserConfig, MockDriver, MockMode};
//!
//! let driver = MockDriver::builder()
//!     .mode(MockMode::Stepped { steps_per_poll: 500 })
//!     .build();
//! let mut focuser = Focuser::new(Box::new(driver.clone()), FocuserConfig::default());
//!
//! assert!(focuser.connect(0));
//! assert!(focuser.move_to(1000));
//! while focuser.is_moving() {}
//! assert_eq!(focuser.position(), 1000);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::driver::{DeviceId, DeviceInfo, EafDriver, FirmwareVersion, MotionStatus};
use crate::error::{EafError, Result};

/// How simulated moves progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Moves complete as soon as they are accepted
    #[default]
    Instant,
    /// Each motion query advances the motor by up to `steps_per_poll`
    Stepped {
        /// Steps travelled per `motion()` call
        steps_per_poll: i32,
    },
    /// Moves run until stopped or [`MockDriver::complete_motion`] is called
    Held,
}

/// Injected failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorScenario {
    /// Operation succeeds `count` times, then fails with `General`
    FailAfterN {
        /// Driver method name, e.g. `"move_to"`
        operation: &'static str,
        /// Successful calls before failing
        count: u32,
    },
    /// Operation always fails with the given error
    AlwaysFail {
        /// Driver method name, e.g. `"stop"`
        operation: &'static str,
        /// Error to report
        error: EafError,
    },
    /// Every device disappears after `after_calls` driver calls
    DeviceRemoved {
        /// Calls that succeed before the bus reports `Removed`
        after_calls: u32,
    },
}

/// Static description of one simulated focuser.
#[derive(Debug, Clone)]
pub struct MockDevice {
    /// Product name
    pub name: String,
    /// Hardware step range (`EAFStepRange`)
    pub step_range: i32,
    /// Initial max step setting
    pub max_step: i32,
    /// Initial position
    pub position: i32,
    /// Temperature reading in °C
    pub temperature: f32,
    /// Firmware version
    pub firmware: FirmwareVersion,
    /// Serial number bytes
    pub serial: [u8; 8],
    /// Hand controller reported as in use
    pub hand_control: bool,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            name: "EAF".to_string(),
            step_range: 100_000,
            max_step: 60_000,
            position: 0,
            temperature: 18.5,
            firmware: FirmwareVersion {
                major: 3,
                minor: 0,
                build: 0,
            },
            serial: [0xea, 0xf0, 0, 0, 0, 0, 0, 1],
            hand_control: false,
        }
    }
}

/// Maximum backlash the EAF firmware accepts.
pub const MAX_BACKLASH: i32 = 255;

/// Entries kept in the call log; older calls are dropped first.
pub const CALL_LOG_CAPACITY: usize = 1024;

const MOCK_SDK_VERSION: &str = "1.6-mock";

#[derive(Debug)]
struct DeviceState {
    model: MockDevice,
    id: DeviceId,
    open: bool,
    removed: bool,
    position: i32,
    target: Option<i32>,
    max_step: i32,
    backlash: i32,
    reverse: bool,
    beep: bool,
}

impl DeviceState {
    fn new(model: MockDevice, id: DeviceId) -> Self {
        Self {
            position: model.position,
            max_step: model.max_step,
            id,
            open: false,
            removed: false,
            target: None,
            backlash: 0,
            reverse: false,
            beep: true,
            model,
        }
    }

    fn advance(&mut self, mode: MockMode) {
        let Some(target) = self.target else {
            return;
        };
        match mode {
            MockMode::Instant => {
                self.position = target;
                self.target = None;
            }
            MockMode::Stepped { steps_per_poll } => {
                let delta = target - self.position;
                let step = delta.clamp(-steps_per_poll.abs(), steps_per_poll.abs());
                self.position += step;
                if self.position == target {
                    self.target = None;
                }
            }
            MockMode::Held => {}
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    devices: Vec<DeviceState>,
    calls: VecDeque<String>,
    op_counts: HashMap<&'static str, u32>,
    total_calls: u32,
}

impl BusState {
    fn record(&mut self, call: String) {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    fn present(&self) -> impl Iterator<Item = &DeviceState> {
        self.devices.iter().filter(|d| !d.removed)
    }

    fn device(&self, id: DeviceId) -> Result<&DeviceState> {
        let dev = self
            .devices
            .iter()
            .find(|d| d.id == id)
            .ok_or(EafError::InvalidId)?;
        if dev.removed {
            return Err(EafError::Removed);
        }
        Ok(dev)
    }

    fn device_mut(&mut self, id: DeviceId) -> Result<&mut DeviceState> {
        let dev = self
            .devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(EafError::InvalidId)?;
        if dev.removed {
            return Err(EafError::Removed);
        }
        Ok(dev)
    }

    fn open_device(&self, id: DeviceId) -> Result<&DeviceState> {
        let dev = self.device(id)?;
        if !dev.open {
            return Err(EafError::Closed);
        }
        Ok(dev)
    }

    fn open_device_mut(&mut self, id: DeviceId) -> Result<&mut DeviceState> {
        let dev = self.device_mut(id)?;
        if !dev.open {
            return Err(EafError::Closed);
        }
        Ok(dev)
    }
}

/// Simulated EAF SDK.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<Mutex<BusState>>,
    mode: MockMode,
    scenarios: Arc<Vec<ErrorScenario>>,
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("mode", &self.mode)
            .field("devices", &self.state.lock().devices.len())
            .finish()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// One default focuser, instant moves.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// A bus with nothing plugged in.
    pub fn empty() -> Self {
        Self::builder().devices(0).build()
    }

    /// Create a builder for configuring MockDriver
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Simulate unplugging the device at `index`; later calls report `Removed`.
    pub fn unplug(&self, index: usize) {
        if let Some(dev) = self.state.lock().devices.get_mut(index) {
            dev.removed = true;
        }
    }

    /// Finish any running move at its target (for [`MockMode::Held`]).
    pub fn complete_motion(&self, index: usize) {
        if let Some(dev) = self.state.lock().devices.get_mut(index) {
            dev.advance(MockMode::Instant);
        }
    }

    /// Whether the device at `index` is open.
    pub fn is_open(&self, index: usize) -> bool {
        self.state
            .lock()
            .devices
            .get(index)
            .is_some_and(|d| d.open)
    }

    /// Simulated motor position of the device at `index`.
    pub fn motor_position(&self, index: usize) -> Option<i32> {
        self.state.lock().devices.get(index).map(|d| d.position)
    }

    /// Pending target of the device at `index`, if it is moving.
    pub fn motor_target(&self, index: usize) -> Option<i32> {
        self.state
            .lock()
            .devices
            .get(index)
            .and_then(|d| d.target)
    }

    /// The most recent driver calls, oldest first, e.g.
    /// `"set_max_step(1, 60000)"`. At most [`CALL_LOG_CAPACITY`] are kept.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.iter().cloned().collect()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Record a call and apply injected failures.
    fn enter(&self, state: &mut BusState, operation: &'static str, args: String) -> Result<()> {
        state.record(format!("{}({})", operation, args));
        state.total_calls += 1;

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::AlwaysFail {
                    operation: op,
                    error,
                } if *op == operation => {
                    debug!(operation, %error, "MockDriver: injected failure");
                    return Err(*error);
                }
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.op_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        debug!(operation, count, "MockDriver: injected failure after N");
                        return Err(EafError::General);
                    }
                }
                ErrorScenario::DeviceRemoved { after_calls } if state.total_calls > *after_calls => {
                    debug!(operation, "MockDriver: device removed");
                    for dev in &mut state.devices {
                        dev.removed = true;
                    }
                    return Err(EafError::Removed);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl EafDriver for MockDriver {
    fn device_count(&self) -> i32 {
        let mut state = self.state.lock();
        if self.enter(&mut state, "device_count", String::new()).is_err() {
            return 0;
        }
        state.present().count() as i32
    }

    fn device_id(&self, index: i32) -> Result<DeviceId> {
        let mut state = self.state.lock();
        self.enter(&mut state, "device_id", index.to_string())?;
        usize::try_from(index)
            .ok()
            .and_then(|i| state.present().nth(i))
            .map(|d| d.id)
            .ok_or(EafError::InvalidIndex)
    }

    fn property(&self, id: DeviceId) -> Result<DeviceInfo> {
        let mut state = self.state.lock();
        self.enter(&mut state, "property", id.to_string())?;
        let dev = state.device(id)?;
        Ok(DeviceInfo {
            id: dev.id,
            name: dev.model.name.clone(),
            max_step: dev.max_step,
        })
    }

    fn open(&mut self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "open", id.to_string())?;
        state.device_mut(id)?.open = true;
        Ok(())
    }

    fn close(&mut self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "close", id.to_string())?;
        let dev = state.device_mut(id)?;
        dev.open = false;
        dev.target = None;
        Ok(())
    }

    fn move_to(&mut self, id: DeviceId, step: i32) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "move_to", format!("{}, {}", id, step))?;
        let mode = self.mode;
        let dev = state.open_device_mut(id)?;
        if dev.target.is_some() {
            return Err(EafError::Moving);
        }
        if !(0..=dev.max_step).contains(&step) {
            return Err(EafError::InvalidValue);
        }
        dev.target = Some(step);
        if mode == MockMode::Instant {
            dev.advance(mode);
        }
        Ok(())
    }

    fn stop(&mut self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "stop", id.to_string())?;
        state.open_device_mut(id)?.target = None;
        Ok(())
    }

    fn motion(&self, id: DeviceId) -> Result<MotionStatus> {
        let mut state = self.state.lock();
        self.enter(&mut state, "motion", id.to_string())?;
        let mode = self.mode;
        let dev = state.open_device_mut(id)?;
        dev.advance(mode);
        Ok(MotionStatus {
            moving: dev.target.is_some(),
            hand_control: dev.model.hand_control,
        })
    }

    fn position(&self, id: DeviceId) -> Result<i32> {
        let mut state = self.state.lock();
        self.enter(&mut state, "position", id.to_string())?;
        Ok(state.open_device(id)?.position)
    }

    fn reset_position(&mut self, id: DeviceId, step: i32) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "reset_position", format!("{}, {}", id, step))?;
        let dev = state.open_device_mut(id)?;
        if dev.target.is_some() {
            return Err(EafError::Moving);
        }
        if !(0..=dev.max_step).contains(&step) {
            return Err(EafError::InvalidValue);
        }
        dev.position = step;
        Ok(())
    }

    fn temperature(&self, id: DeviceId) -> Result<f32> {
        let mut state = self.state.lock();
        self.enter(&mut state, "temperature", id.to_string())?;
        Ok(state.open_device(id)?.model.temperature)
    }

    fn set_beep(&mut self, id: DeviceId, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "set_beep", format!("{}, {}", id, enabled))?;
        state.open_device_mut(id)?.beep = enabled;
        Ok(())
    }

    fn beep(&self, id: DeviceId) -> Result<bool> {
        let mut state = self.state.lock();
        self.enter(&mut state, "beep", id.to_string())?;
        Ok(state.open_device(id)?.beep)
    }

    fn set_max_step(&mut self, id: DeviceId, steps: i32) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "set_max_step", format!("{}, {}", id, steps))?;
        let dev = state.open_device_mut(id)?;
        if dev.target.is_some() {
            return Err(EafError::Moving);
        }
        if steps <= 0 {
            return Err(EafError::InvalidValue);
        }
        dev.max_step = steps.min(dev.model.step_range);
        Ok(())
    }

    fn max_step(&self, id: DeviceId) -> Result<i32> {
        let mut state = self.state.lock();
        self.enter(&mut state, "max_step", id.to_string())?;
        Ok(state.open_device(id)?.max_step)
    }

    fn step_range(&self, id: DeviceId) -> Result<i32> {
        let mut state = self.state.lock();
        self.enter(&mut state, "step_range", id.to_string())?;
        let dev = state.open_device(id)?;
        if dev.target.is_some() {
            return Err(EafError::Moving);
        }
        Ok(dev.model.step_range)
    }

    fn set_reverse(&mut self, id: DeviceId, reversed: bool) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "set_reverse", format!("{}, {}", id, reversed))?;
        state.open_device_mut(id)?.reverse = reversed;
        Ok(())
    }

    fn reverse(&self, id: DeviceId) -> Result<bool> {
        let mut state = self.state.lock();
        self.enter(&mut state, "reverse", id.to_string())?;
        Ok(state.open_device(id)?.reverse)
    }

    fn set_backlash(&mut self, id: DeviceId, steps: i32) -> Result<()> {
        let mut state = self.state.lock();
        self.enter(&mut state, "set_backlash", format!("{}, {}", id, steps))?;
        let dev = state.open_device_mut(id)?;
        if !(0..=MAX_BACKLASH).contains(&steps) {
            return Err(EafError::InvalidValue);
        }
        dev.backlash = steps;
        Ok(())
    }

    fn backlash(&self, id: DeviceId) -> Result<i32> {
        let mut state = self.state.lock();
        self.enter(&mut state, "backlash", id.to_string())?;
        Ok(state.open_device(id)?.backlash)
    }

    fn sdk_version(&self) -> String {
        MOCK_SDK_VERSION.to_string()
    }

    fn firmware_version(&self, id: DeviceId) -> Result<FirmwareVersion> {
        let mut state = self.state.lock();
        self.enter(&mut state, "firmware_version", id.to_string())?;
        Ok(state.open_device(id)?.model.firmware)
    }

    fn serial_number(&self, id: DeviceId) -> Result<String> {
        let mut state = self.state.lock();
        self.enter(&mut state, "serial_number", id.to_string())?;
        let dev = state.open_device(id)?;
        Ok(dev.model.serial.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`MockDriver`].
#[derive(Debug, Default)]
pub struct MockDriverBuilder {
    devices: Option<Vec<MockDevice>>,
    mode: MockMode,
    scenarios: Vec<ErrorScenario>,
}

impl MockDriverBuilder {
    /// Start from one default device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device list with `count` default devices.
    pub fn devices(mut self, count: usize) -> Self {
        self.devices = Some(vec![MockDevice::default(); count]);
        self
    }

    /// Append a device.
    pub fn device(mut self, device: MockDevice) -> Self {
        self.devices.get_or_insert_with(Vec::new).push(device);
        self
    }

    /// Set how moves progress.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add an injected failure.
    pub fn scenario(mut self, scenario: ErrorScenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Build the driver. Device IDs are assigned from 1 in index order.
    pub fn build(self) -> MockDriver {
        let specs = self.devices.unwrap_or_else(|| vec![MockDevice::default()]);
        let devices = specs
            .into_iter()
            .enumerate()
            .map(|(i, model)| DeviceState::new(model, DeviceId(i as i32 + 1)))
            .collect();

        MockDriver {
            state: Arc::new(Mutex::new(BusState {
                devices,
                ..Default::default()
            })),
            mode: self.mode,
            scenarios: Arc::new(self.scenarios),
        }
    }
}
