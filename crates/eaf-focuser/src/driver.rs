//! The driver capability: everything the adapter needs from an EAF SDK.
//!
//! [`EafDriver`] mirrors the vendor C ABI one method per entry point, with
//! out-parameters turned into return values and status codes into
//! [`EafError`](crate::EafError). Two implementations ship with this crate:
//!
//! - `SdkDriver` (feature `sdk`) calls into `libEAFFocuser` through `eaf-sys`
//! - [`MockDriver`](crate::MockDriver) simulates focusers for tests and demos

use std::fmt;

use crate::error::Result;

/// SDK-assigned device identifier.
///
/// Obtained from an enumeration index via [`EafDriver::device_id`]; it stays
/// stable while the device remains plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// Placeholder used while no device is open. The SDK never assigns it.
    pub const UNSET: DeviceId = DeviceId(-1);

    /// Raw integer handed to the SDK.
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property record of an attached focuser (`EAF_INFO`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device ID
    pub id: DeviceId,
    /// Product name reported by the firmware, e.g. "EAF"
    pub name: String,
    /// Hardware travel limit in steps
    pub max_step: i32,
}

/// Motion flags reported by `EAFIsMoving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionStatus {
    /// Motor is running
    pub moving: bool,
    /// Motor is being driven by the hand controller
    pub hand_control: bool,
}

/// Firmware version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
    /// Build number
    pub build: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Access to an EAF focuser SDK.
///
/// All calls are synchronous and may block on USB I/O. Implementations do
/// not serialize access; callers own that responsibility.
pub trait EafDriver: Send {
    /// Number of attached focusers. Zero or negative means none.
    fn device_count(&self) -> i32;

    /// Resolve an enumeration index to a device ID.
    fn device_id(&self, index: i32) -> Result<DeviceId>;

    /// Read the property record of a device.
    fn property(&self, id: DeviceId) -> Result<DeviceInfo>;

    /// Open a device for use.
    fn open(&mut self, id: DeviceId) -> Result<()>;

    /// Close a device.
    fn close(&mut self, id: DeviceId) -> Result<()>;

    /// Start moving to an absolute step position. Returns once accepted.
    fn move_to(&mut self, id: DeviceId, step: i32) -> Result<()>;

    /// Stop a running move.
    fn stop(&mut self, id: DeviceId) -> Result<()>;

    /// Query motion state.
    fn motion(&self, id: DeviceId) -> Result<MotionStatus>;

    /// Current step position.
    fn position(&self, id: DeviceId) -> Result<i32>;

    /// Overwrite the position counter without moving the motor.
    fn reset_position(&mut self, id: DeviceId, step: i32) -> Result<()>;

    /// Temperature sensor reading in °C.
    fn temperature(&self, id: DeviceId) -> Result<f32>;

    /// Enable or disable the beep when a move starts.
    fn set_beep(&mut self, id: DeviceId, enabled: bool) -> Result<()>;

    /// Whether the beep is enabled.
    fn beep(&self, id: DeviceId) -> Result<bool>;

    /// Set the maximum travel in steps.
    fn set_max_step(&mut self, id: DeviceId, steps: i32) -> Result<()>;

    /// Maximum travel in steps.
    fn max_step(&self, id: DeviceId) -> Result<i32>;

    /// Allowed step range. Fails while the motor is moving.
    fn step_range(&self, id: DeviceId) -> Result<i32>;

    /// Set the reversed-direction flag.
    fn set_reverse(&mut self, id: DeviceId, reversed: bool) -> Result<()>;

    /// Reversed-direction flag.
    fn reverse(&self, id: DeviceId) -> Result<bool>;

    /// Set backlash compensation in steps.
    fn set_backlash(&mut self, id: DeviceId, steps: i32) -> Result<()>;

    /// Backlash compensation in steps.
    fn backlash(&self, id: DeviceId) -> Result<i32>;

    /// SDK version string.
    fn sdk_version(&self) -> String;

    /// Firmware version of a device.
    fn firmware_version(&self, id: DeviceId) -> Result<FirmwareVersion>;

    /// Serial number of a device as a hex string.
    fn serial_number(&self, id: DeviceId) -> Result<String>;
}
