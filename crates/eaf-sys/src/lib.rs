//! Low-level FFI bindings for the ZWO EAF focuser SDK.
//!
//! This crate provides raw, unsafe bindings to `libEAFFocuser`, the
//! closed-source static library ZWO ships for its EAF (Electronic Automatic
//! Focuser) product line.
//!
//! # SDK Overview
//!
//! Devices are enumerated by index (`EAFGetNum`, `EAFGetID`) and addressed
//! afterwards by an integer ID. Every call returns an [`EAF_ERROR_CODE`] and
//! reports values through out-parameters. Moves are asynchronous: `EAFMove`
//! returns as soon as the command is accepted and `EAFIsMoving` must be polled.
//!
//! # Safety
//!
//! All functions in this crate are `unsafe` as they are direct FFI bindings.
//! For a safe wrapper, use the `eaf-focuser` crate instead.
//!
//! # Features
//!
//! - `eaf-sdk`: Generate bindings from `EAF_focuser.h` and link the SDK.
//!   Without this feature, pre-defined bindings with panicking stubs are used.
//!
//! # Example (unsafe)
//!
//! ```no_run
//! use eaf_sys::*;
//!
//! unsafe {
//!     if EAFGetNum() > 0 {
//!         let mut id = 0;
//!         if EAFGetID(0, &mut id) == EAF_SUCCESS && EAFOpen(id) == EAF_SUCCESS {
//!             let mut position = 0;
//!             EAFGetPosition(id, &mut position);
//!             println!("Focuser {} at step {}", id, position);
//!             EAFClose(id);
//!         }
//!     }
//! }
//! ```

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(unsafe_code)]
#![allow(missing_docs)]
#![allow(clippy::all)]

// Include the generated bindings
include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(EAF_SUCCESS, 0);
        assert_eq!(EAF_ERROR_INVALID_INDEX, 1);
        assert_eq!(EAF_ERROR_MOVING, 5);
        assert_eq!(EAF_ERROR_CLOSED, 9);
        assert_eq!(EAF_ERROR_END, -1);
    }

    #[test]
    fn test_info_layout() {
        let info = EAF_INFO::default();
        assert_eq!(info.Name.len(), 64);
        assert_eq!(info.ID, 0);
        assert_eq!(info.MaxStep, 0);
    }

    #[test]
    fn test_serial_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<EAF_SN>(), 8);
    }
}
