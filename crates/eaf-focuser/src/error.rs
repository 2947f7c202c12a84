//! Error types for EAF driver operations.
//!
//! The vendor SDK reports every failure as an integer status code. [`EafError`]
//! gives each code a name so logs say *why* a call failed, even though the
//! [`Focuser`](crate::Focuser) adapter flattens failures to sentinels.

use thiserror::Error;

/// Result type alias for EAF driver operations.
pub type Result<T> = std::result::Result<T, EafError>;

/// Raw status codes returned by the EAF SDK.
pub mod code {
    /// Call succeeded
    pub const SUCCESS: i32 = 0;
    /// No device at this index
    pub const INVALID_INDEX: i32 = 1;
    /// No device with this ID
    pub const INVALID_ID: i32 = 2;
    /// Argument out of range
    pub const INVALID_VALUE: i32 = 3;
    /// Device was unplugged
    pub const REMOVED: i32 = 4;
    /// Device is moving
    pub const MOVING: i32 = 5;
    /// Device is in error state
    pub const ERROR_STATE: i32 = 6;
    /// Other error
    pub const GENERAL_ERROR: i32 = 7;
    /// Not supported by this device
    pub const NOT_SUPPORTED: i32 = 8;
    /// Device is not open
    pub const CLOSED: i32 = 9;
}

/// Errors reported by the EAF driver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EafError {
    /// Enumeration index does not name an attached device
    #[error("Invalid device index")]
    InvalidIndex,

    /// ID does not belong to a known device
    #[error("Invalid device ID")]
    InvalidId,

    /// Argument rejected by the device (e.g. target beyond max step)
    #[error("Invalid value")]
    InvalidValue,

    /// Focuser could not be found, it has probably been unplugged
    #[error("Focuser has been removed")]
    Removed,

    /// Operation refused because the motor is moving
    #[error("Focuser is moving")]
    Moving,

    /// Focuser reports an error state
    #[error("Focuser is in error state")]
    ErrorState,

    /// Unspecified driver failure
    #[error("General driver error")]
    General,

    /// Operation not supported by this focuser
    #[error("Operation not supported by the focuser")]
    NotSupported,

    /// Device has not been opened or was closed
    #[error("Focuser is closed")]
    Closed,

    /// Status code not known to this crate
    #[error("Unknown EAF error code {0}")]
    Unknown(i32),

    /// Crate was built without the SDK
    #[error("EAF SDK support not compiled in (enable the `sdk` feature)")]
    NotSupportedBySdk,
}

impl EafError {
    /// Map a raw status code. Returns `None` for [`code::SUCCESS`].
    pub fn from_code(raw: i32) -> Option<Self> {
        let err = match raw {
            code::SUCCESS => return None,
            code::INVALID_INDEX => Self::InvalidIndex,
            code::INVALID_ID => Self::InvalidId,
            code::INVALID_VALUE => Self::InvalidValue,
            code::REMOVED => Self::Removed,
            code::MOVING => Self::Moving,
            code::ERROR_STATE => Self::ErrorState,
            code::GENERAL_ERROR => Self::General,
            code::NOT_SUPPORTED => Self::NotSupported,
            code::CLOSED => Self::Closed,
            other => Self::Unknown(other),
        };
        Some(err)
    }

    /// Convert a raw status code into a `Result`.
    pub fn check(raw: i32) -> Result<()> {
        match Self::from_code(raw) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Raw status code for this error, if it has one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::InvalidIndex => Some(code::INVALID_INDEX),
            Self::InvalidId => Some(code::INVALID_ID),
            Self::InvalidValue => Some(code::INVALID_VALUE),
            Self::Removed => Some(code::REMOVED),
            Self::Moving => Some(code::MOVING),
            Self::ErrorState => Some(code::ERROR_STATE),
            Self::General => Some(code::GENERAL_ERROR),
            Self::NotSupported => Some(code::NOT_SUPPORTED),
            Self::Closed => Some(code::CLOSED),
            Self::Unknown(raw) => Some(*raw),
            Self::NotSupportedBySdk => None,
        }
    }

    /// Check if the device has gone away.
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}
