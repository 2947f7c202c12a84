//! The focuser adapter.
//!
//! [`Focuser`] owns one device handle and forwards each call to an
//! [`EafDriver`], flattening the result to a boolean or a sentinel:
//!
//! | Query            | On failure |
//! |------------------|------------|
//! | `maximal_step`   | `-1`       |
//! | `backlash`       | `-1`       |
//! | `position`       | `-1`       |
//! | `step_range`     | `-1`       |
//! | `direction`      | `false`    |
//! | `sound`          | `false`    |
//! | `is_moving`      | `false`    |
//! | `temperature`    | `NaN`      |
//!
//! The cause of each failure is logged at `warn` with the typed
//! [`EafError`](crate::EafError). Motion is never cached: every query goes
//! to the driver.

use tracing::{debug, info, warn};

use crate::config::FocuserConfig;
use crate::driver::{DeviceId, DeviceInfo, EafDriver, FirmwareVersion};
use crate::error::Result;

/// Sentinel returned by integer getters on failure.
pub const FAILED: i32 = -1;

/// Adapter over one EAF focuser.
///
/// Disconnected until [`connect`](Self::connect) succeeds. While
/// disconnected, calls reach the driver with [`DeviceId::UNSET`] and fail
/// the way the SDK fails for an unknown ID.
pub struct Focuser {
    driver: Box<dyn EafDriver>,
    config: FocuserConfig,
    handle: Option<DeviceId>,
    info: Option<DeviceInfo>,
}

impl std::fmt::Debug for Focuser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Focuser")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Focuser {
    /// Adapter over `driver` with the given initial configuration.
    pub fn new(driver: Box<dyn EafDriver>, config: FocuserConfig) -> Self {
        Self {
            driver,
            config,
            handle: None,
            info: None,
        }
    }

    /// Adapter with default configuration.
    pub fn with_driver(driver: Box<dyn EafDriver>) -> Self {
        Self::new(driver, FocuserConfig::default())
    }

    /// Adapter over the vendor SDK.
    #[cfg(feature = "sdk")]
    pub fn with_sdk(config: FocuserConfig) -> Self {
        Self::new(Box::new(crate::sdk::SdkDriver::new()), config)
    }

    fn id(&self) -> DeviceId {
        self.handle.unwrap_or(DeviceId::UNSET)
    }

    /// Unwrap a driver result, logging the failure and substituting `fallback`.
    fn or_sentinel<T>(&self, op: &'static str, result: Result<T>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(op, device = %self.id(), error = %e, "EAF call failed");
                fallback
            }
        }
    }

    /// Log a failed fire-and-forget call; returns whether it succeeded.
    fn log_failure(&self, op: &'static str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(op, device = %self.id(), error = %e, "EAF call failed");
                false
            }
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Open the focuser at enumeration `index` and push the cached settings.
    ///
    /// Returns false if nothing is attached, `index` is out of range, or the
    /// SDK refuses to open the device. Calling again re-opens.
    pub fn connect(&mut self, index: i32) -> bool {
        let count = self.driver.device_count();
        if count <= 0 {
            warn!("No EAF focuser attached");
            return false;
        }
        if index < 0 || index >= count {
            warn!(index, count, "EAF device index out of range");
            return false;
        }

        let id = match self.driver.device_id(index) {
            Ok(id) => id,
            Err(e) => {
                warn!(index, error = %e, "Could not resolve EAF device ID");
                return false;
            }
        };

        let info = match self.driver.property(id) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(%id, error = %e, "Could not read EAF property record");
                None
            }
        };

        if let Err(e) = self.driver.open(id) {
            warn!(%id, error = %e, "Could not open EAF focuser");
            return false;
        }

        self.handle = Some(id);
        self.info = info;
        self.config.device_number = index;
        self.push_config();

        info!(
            index,
            %id,
            name = self.info.as_ref().map_or("?", |i| i.name.as_str()),
            "Connected to EAF focuser"
        );
        true
    }

    /// Connect the device named by the configured index.
    pub fn connect_configured(&mut self) -> bool {
        self.connect(self.config.device_number)
    }

    fn push_config(&mut self) {
        let id = self.id();
        let FocuserConfig {
            max_steps,
            backlash,
            direction,
            sound,
            ..
        } = self.config;

        let r = self.driver.set_max_step(id, max_steps);
        self.log_failure("set_max_step", r);
        let r = self.driver.set_backlash(id, backlash);
        self.log_failure("set_backlash", r);
        let r = self.driver.set_reverse(id, direction);
        self.log_failure("set_reverse", r);
        let r = self.driver.set_beep(id, sound);
        self.log_failure("set_beep", r);
    }

    /// Close the device. True iff the SDK accepted the close.
    pub fn disconnect(&mut self) -> bool {
        let id = self.id();
        let result = self.driver.close(id);
        if !self.log_failure("close", result) {
            return false;
        }
        self.handle = None;
        self.info = None;
        info!(%id, "Disconnected from EAF focuser");
        true
    }

    /// Whether a device handle is held.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Device handle, if connected.
    pub fn handle(&self) -> Option<DeviceId> {
        self.handle
    }

    /// Cached configuration.
    pub fn config(&self) -> &FocuserConfig {
        &self.config
    }

    /// Property record read at connect time.
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Maximum travel in steps, or `-1`.
    pub fn maximal_step(&mut self) -> i32 {
        let r = self.driver.max_step(self.id());
        let value = self.or_sentinel("max_step", r, FAILED);
        if value != FAILED {
            self.config.max_steps = value;
        }
        value
    }

    /// Set the maximum travel in steps.
    pub fn set_maximal_step(&mut self, steps: i32) {
        debug!(steps, "set_maximal_step");
        self.config.max_steps = steps;
        let r = self.driver.set_max_step(self.id(), steps);
        self.log_failure("set_max_step", r);
    }

    /// Backlash compensation in steps, or `-1`.
    pub fn backlash(&mut self) -> i32 {
        let r = self.driver.backlash(self.id());
        let value = self.or_sentinel("backlash", r, FAILED);
        if value != FAILED {
            self.config.backlash = value;
        }
        value
    }

    /// Set backlash compensation in steps.
    pub fn set_backlash(&mut self, steps: i32) {
        debug!(steps, "set_backlash");
        self.config.backlash = steps;
        let r = self.driver.set_backlash(self.id(), steps);
        self.log_failure("set_backlash", r);
    }

    /// Reversed-direction flag, or `false`.
    pub fn direction(&mut self) -> bool {
        match self.driver.reverse(self.id()) {
            Ok(reversed) => {
                self.config.direction = reversed;
                reversed
            }
            Err(e) => {
                warn!(op = "reverse", device = %self.id(), error = %e, "EAF call failed");
                false
            }
        }
    }

    /// Set the reversed-direction flag.
    pub fn set_direction(&mut self, reversed: bool) {
        debug!(reversed, "set_direction");
        self.config.direction = reversed;
        let r = self.driver.set_reverse(self.id(), reversed);
        self.log_failure("set_reverse", r);
    }

    /// Beep-on-move flag, or `false`.
    pub fn sound(&mut self) -> bool {
        match self.driver.beep(self.id()) {
            Ok(enabled) => {
                self.config.sound = enabled;
                enabled
            }
            Err(e) => {
                warn!(op = "beep", device = %self.id(), error = %e, "EAF call failed");
                false
            }
        }
    }

    /// Enable or disable the beep on move.
    pub fn set_sound(&mut self, enabled: bool) {
        debug!(enabled, "set_sound");
        self.config.sound = enabled;
        let r = self.driver.set_beep(self.id(), enabled);
        self.log_failure("set_beep", r);
    }

    // =========================================================================
    // Readings
    // =========================================================================

    /// Temperature in °C, `NaN` if the sensor could not be read.
    pub fn temperature(&self) -> f32 {
        let r = self.driver.temperature(self.id());
        self.or_sentinel("temperature", r, f32::NAN)
    }

    /// True only if the driver answers and reports motion.
    ///
    /// The hand-controller flag is read but ignored.
    pub fn is_moving(&self) -> bool {
        let r = self.driver.motion(self.id()).map(|m| m.moving);
        self.or_sentinel("motion", r, false)
    }

    /// Current step position, or `-1`.
    pub fn position(&self) -> i32 {
        let r = self.driver.position(self.id());
        self.or_sentinel("position", r, FAILED)
    }

    /// Overwrite the position counter without moving the motor.
    pub fn reset_position(&mut self, step: i32) {
        debug!(step, "reset_position");
        let r = self.driver.reset_position(self.id(), step);
        self.log_failure("reset_position", r);
    }

    /// Allowed step range, or `-1` while moving or on failure.
    pub fn step_range(&self) -> i32 {
        if self.is_moving() {
            debug!("step_range refused while moving");
            return FAILED;
        }
        let r = self.driver.step_range(self.id());
        self.or_sentinel("step_range", r, FAILED)
    }

    // =========================================================================
    // Motion
    // =========================================================================

    /// Start a move to `target` steps.
    ///
    /// Returns false if the focuser is already moving or the SDK refuses the
    /// move. Does not wait; poll [`is_moving`](Self::is_moving).
    pub fn move_to(&mut self, target: i32) -> bool {
        if self.is_moving() {
            warn!(target, "EAF move refused: focuser is moving");
            return false;
        }
        let r = self.driver.move_to(self.id(), target);
        let accepted = self.log_failure("move_to", r);
        if accepted {
            debug!(target, "EAF move started");
        }
        accepted
    }

    /// Stop a running move. True iff the SDK accepted the stop.
    pub fn stop(&mut self) -> bool {
        let r = self.driver.stop(self.id());
        self.log_failure("stop", r)
    }

    // =========================================================================
    // Identification
    // =========================================================================

    /// SDK version string.
    pub fn sdk_version(&self) -> String {
        self.driver.sdk_version()
    }

    /// Firmware version, if it can be read.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        let r = self.driver.firmware_version(self.id()).map(Some);
        self.or_sentinel("firmware_version", r, None)
    }

    /// Serial number as hex, if it can be read.
    pub fn serial_number(&self) -> Option<String> {
        let r = self.driver.serial_number(self.id()).map(Some);
        self.or_sentinel("serial_number", r, None)
    }
}
