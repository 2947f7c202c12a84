//! Safe Rust driver for the ZWO EAF focuser.
//!
//! This crate wraps the vendor's closed-source `libEAFFocuser` behind a
//! small adapter that mirrors the SDK one call at a time. Failures are
//! logged with their cause and flattened to booleans or sentinel values,
//! which is what scripting hosts (Python, Rhai) expect.
//!
//! # Architecture
//!
//! ## Driver Layer
//! - [`EafDriver`] - One method per SDK entry point, typed results
//! - `SdkDriver` - FFI into the vendor SDK via `eaf-sys` (feature `sdk`)
//! - [`MockDriver`] - Simulated bus for tests and demos
//! - [`EafError`] - Named vendor status codes
//!
//! ## Adapter
//! - [`Focuser`] - Owns one device handle and the settings pushed on connect
//!
//! ## Focus Control
//! - [`FocusModule`] - Millimetre positions, supervised moves, offsets, parking
//! - [`Movable`] - Motion capability implemented by [`FocusModule`]
//!
//! ## Ambient
//! - [`EafConfig`] - Figment-layered configuration (defaults, TOML, `EAF_*` env)
//! - [`logging`] - `tracing-subscriber` initialization
//!
//! # Features
//!
//! - `sdk` - link the vendor SDK (see `eaf-sys` for how it is located)
//! - `hardware_tests` - tests that need a physical focuser
//!
//! # Example
//!
//! ```
//! use eaf_focuser::{Focuser, FocuserConfig, MockDriver};
//!
//! let mut focuser = Focuser::new(Box::new(MockDriver::new()), FocuserConfig::default());
//! assert!(focuser.connect(0));
//!
//! focuser.set_backlash(20);
//! assert_eq!(focuser.backlash(), 20);
//!
//! if !focuser.is_moving() {
//!     assert!(focuser.move_to(12_000));
//! }
//! assert!(focuser.disconnect());
//! ```

pub mod capabilities;
pub mod config;
pub mod driver;
pub mod error;
pub mod focuser;
pub mod logging;
pub mod mock;
pub mod module;
#[cfg(feature = "sdk")]
pub mod sdk;

pub use capabilities::Movable;
pub use config::{ConfigError, EafConfig, FocuserConfig, ModuleConfig};
pub use driver::{DeviceId, DeviceInfo, EafDriver, FirmwareVersion, MotionStatus};
pub use error::{EafError, Result};
pub use focuser::{Focuser, FAILED};
pub use logging::{LogFormat, LoggingConfig};
pub use mock::{ErrorScenario, MockDevice, MockDriver, MockDriverBuilder, MockMode};
pub use module::{FocusModule, ModuleError, MotionState};
#[cfg(feature = "sdk")]
pub use sdk::SdkDriver;

/// Driver for the current build: the vendor SDK with feature `sdk`,
/// otherwise a simulated single-focuser bus.
pub fn default_driver() -> Box<dyn EafDriver> {
    #[cfg(feature = "sdk")]
    {
        Box::new(SdkDriver::new())
    }
    #[cfg(not(feature = "sdk"))]
    {
        Box::new(MockDriver::new())
    }
}
