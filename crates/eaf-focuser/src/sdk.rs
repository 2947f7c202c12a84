//! Production driver backed by the ZWO EAF SDK.
//!
//! Every method is a single FFI call into `libEAFFocuser`. Out-parameters
//! live on the stack for the duration of the call.

#![allow(unsafe_code)]

use std::ffi::CStr;

use eaf_sys as sys;
use tracing::trace;

use crate::driver::{DeviceId, DeviceInfo, EafDriver, FirmwareVersion, MotionStatus};
use crate::error::{EafError, Result};

/// [`EafDriver`] that talks to real focusers through the vendor SDK.
///
/// The SDK keeps process-wide state; any number of `SdkDriver` values may
/// exist, but each open device should be driven by one adapter only.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkDriver;

impl SdkDriver {
    /// Create a driver handle.
    pub fn new() -> Self {
        Self
    }
}

impl EafDriver for SdkDriver {
    fn device_count(&self) -> i32 {
        // SAFETY: No arguments; the SDK enumerates HID devices internally.
        let count = unsafe { sys::EAFGetNum() };
        trace!(count, "EAFGetNum");
        count
    }

    fn device_id(&self, index: i32) -> Result<DeviceId> {
        let mut id = 0;
        // SAFETY: `id` is a valid, writable c_int for the duration of the call.
        EafError::check(unsafe { sys::EAFGetID(index, &mut id) })?;
        Ok(DeviceId(id))
    }

    fn property(&self, id: DeviceId) -> Result<DeviceInfo> {
        let mut info = sys::EAF_INFO::default();
        // SAFETY: `info` is a properly laid out EAF_INFO owned by this frame.
        EafError::check(unsafe { sys::EAFGetProperty(id.raw(), &mut info) })?;

        // SAFETY: The SDK writes a NUL-terminated name into the fixed buffer.
        // Guard anyway by terminating the last byte of our copy.
        let mut name_buf = info.Name;
        name_buf[name_buf.len() - 1] = 0;
        let name = unsafe { CStr::from_ptr(name_buf.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Ok(DeviceInfo {
            id: DeviceId(info.ID),
            name,
            max_step: info.MaxStep,
        })
    }

    fn open(&mut self, id: DeviceId) -> Result<()> {
        // SAFETY: Plain integer argument.
        EafError::check(unsafe { sys::EAFOpen(id.raw()) })
    }

    fn close(&mut self, id: DeviceId) -> Result<()> {
        // SAFETY: Plain integer argument. Closing an unknown ID is reported,
        // not undefined.
        EafError::check(unsafe { sys::EAFClose(id.raw()) })
    }

    fn move_to(&mut self, id: DeviceId, step: i32) -> Result<()> {
        // SAFETY: Plain integer arguments.
        EafError::check(unsafe { sys::EAFMove(id.raw(), step) })
    }

    fn stop(&mut self, id: DeviceId) -> Result<()> {
        // SAFETY: Plain integer argument.
        EafError::check(unsafe { sys::EAFStop(id.raw()) })
    }

    fn motion(&self, id: DeviceId) -> Result<MotionStatus> {
        let mut moving = false;
        let mut hand_control = false;
        // SAFETY: Both out-pointers reference live stack booleans.
        EafError::check(unsafe { sys::EAFIsMoving(id.raw(), &mut moving, &mut hand_control) })?;
        Ok(MotionStatus {
            moving,
            hand_control,
        })
    }

    fn position(&self, id: DeviceId) -> Result<i32> {
        let mut step = 0;
        // SAFETY: `step` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetPosition(id.raw(), &mut step) })?;
        Ok(step)
    }

    fn reset_position(&mut self, id: DeviceId, step: i32) -> Result<()> {
        // SAFETY: Plain integer arguments. The symbol name carries the SDK's typo.
        EafError::check(unsafe { sys::EAFResetPostion(id.raw(), step) })
    }

    fn temperature(&self, id: DeviceId) -> Result<f32> {
        let mut temp = 0.0f32;
        // SAFETY: `temp` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetTemp(id.raw(), &mut temp) })?;
        Ok(temp)
    }

    fn set_beep(&mut self, id: DeviceId, enabled: bool) -> Result<()> {
        // SAFETY: Plain arguments.
        EafError::check(unsafe { sys::EAFSetBeep(id.raw(), enabled) })
    }

    fn beep(&self, id: DeviceId) -> Result<bool> {
        let mut enabled = false;
        // SAFETY: `enabled` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetBeep(id.raw(), &mut enabled) })?;
        Ok(enabled)
    }

    fn set_max_step(&mut self, id: DeviceId, steps: i32) -> Result<()> {
        // SAFETY: Plain integer arguments.
        EafError::check(unsafe { sys::EAFSetMaxStep(id.raw(), steps) })
    }

    fn max_step(&self, id: DeviceId) -> Result<i32> {
        let mut steps = 0;
        // SAFETY: `steps` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetMaxStep(id.raw(), &mut steps) })?;
        Ok(steps)
    }

    fn step_range(&self, id: DeviceId) -> Result<i32> {
        let mut range = 0;
        // SAFETY: `range` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFStepRange(id.raw(), &mut range) })?;
        Ok(range)
    }

    fn set_reverse(&mut self, id: DeviceId, reversed: bool) -> Result<()> {
        // SAFETY: Plain arguments.
        EafError::check(unsafe { sys::EAFSetReverse(id.raw(), reversed) })
    }

    fn reverse(&self, id: DeviceId) -> Result<bool> {
        let mut reversed = false;
        // SAFETY: `reversed` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetReverse(id.raw(), &mut reversed) })?;
        Ok(reversed)
    }

    fn set_backlash(&mut self, id: DeviceId, steps: i32) -> Result<()> {
        // SAFETY: Plain integer arguments.
        EafError::check(unsafe { sys::EAFSetBacklash(id.raw(), steps) })
    }

    fn backlash(&self, id: DeviceId) -> Result<i32> {
        let mut steps = 0;
        // SAFETY: `steps` is a valid out-pointer.
        EafError::check(unsafe { sys::EAFGetBacklash(id.raw(), &mut steps) })?;
        Ok(steps)
    }

    fn sdk_version(&self) -> String {
        // SAFETY: Returns a pointer to a static string owned by the SDK.
        let ptr = unsafe { sys::EAFGetSDKVersion() };
        if ptr.is_null() {
            return "unknown".to_string();
        }
        // SAFETY: Non-null, NUL-terminated, lives for the process lifetime.
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn firmware_version(&self, id: DeviceId) -> Result<FirmwareVersion> {
        let (mut major, mut minor, mut build) = (0u8, 0u8, 0u8);
        // SAFETY: Three valid u8 out-pointers.
        EafError::check(unsafe {
            sys::EAFGetFirmwareVersion(id.raw(), &mut major, &mut minor, &mut build)
        })?;
        Ok(FirmwareVersion {
            major,
            minor,
            build,
        })
    }

    fn serial_number(&self, id: DeviceId) -> Result<String> {
        let mut sn = sys::EAF_SN::default();
        // SAFETY: `sn` is an owned 8-byte EAF_SN.
        EafError::check(unsafe { sys::EAFGetSerialNumber(id.raw(), &mut sn) })?;
        Ok(sn.id.iter().map(|b| format!("{:02x}", b)).collect())
    }
}
