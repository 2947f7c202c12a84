//! Build script for eaf-sys FFI bindings.
//!
//! Two modes:
//!
//! 1. With `eaf-sdk` feature: generates bindings from `EAF_focuser.h` and links
//!    the static `libEAFFocuser` shipped with the ZWO SDK.
//! 2. Without feature: writes pre-defined bindings with panicking stubs so the
//!    workspace builds and tests on machines without the SDK.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=EAF_SDK_DIR");
    println!("cargo:rerun-if-env-changed=EAF_INCLUDE_DIR");
    println!("cargo:rerun-if-env-changed=EAF_LIB_DIR");

    #[cfg(feature = "eaf-sdk")]
    {
        let sdk_dir = env::var("EAF_SDK_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            panic!("EAF_SDK_DIR environment variable must be set when `eaf-sdk` feature is enabled.")
        });

        let include_dir = env::var("EAF_INCLUDE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| sdk_dir.join("include"));
        let lib_dir = env::var("EAF_LIB_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| sdk_dir.join("lib").join(sdk_arch_dir()));

        generate_bindings(&include_dir);
        link_sdk(&lib_dir);
    }

    #[cfg(not(feature = "eaf-sdk"))]
    generate_dummy_bindings();
}

/// Name of the architecture subdirectory in the SDK's `lib/` folder.
///
/// Uses the *target* architecture, not the host the build script runs on.
#[cfg(feature = "eaf-sdk")]
fn sdk_arch_dir() -> &'static str {
    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    if os == "macos" {
        return "mac";
    }

    match arch.as_str() {
        "x86_64" => "x64",
        "x86" => "x86",
        "arm" => "armv7",
        "aarch64" => "armv8",
        other => panic!("Unsupported target architecture for the EAF SDK: {}", other),
    }
}

#[cfg(feature = "eaf-sdk")]
fn generate_bindings(include_dir: &std::path::Path) {
    let header = include_dir.join("EAF_focuser.h");
    if !header.exists() {
        panic!("EAF SDK header does not exist: {:?}", header);
    }
    println!("cargo:rerun-if-changed={}", header.display());

    let bindings = bindgen::Builder::default()
        .header(header.to_string_lossy())
        // The SDK header is C++ (uses `bool` and default arguments)
        .clang_arg("-xc++")
        .clang_arg("-std=c++11")
        .clang_arg(format!("-I{}", include_dir.display()))
        .allowlist_function("EAF.*")
        .allowlist_type("EAF_.*|_EAF_.*")
        .allowlist_var("EAF_.*")
        // Keep error codes as flat top-level constants (matches dummy bindings)
        .default_enum_style(bindgen::EnumVariation::Consts)
        .prepend_enum_name(false)
        .derive_debug(true)
        .derive_default(true)
        .derive_copy(true)
        .generate_comments(true)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("Unable to generate EAF bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Couldn't write bindings!");
}

#[cfg(feature = "eaf-sdk")]
fn link_sdk(lib_dir: &std::path::Path) {
    // The lib path might be absent if the library is installed globally.
    // Warn rather than panic.
    if !lib_dir.exists() {
        println!(
            "cargo:warning=EAF SDK lib path does not exist: {}",
            lib_dir.display()
        );
    }
    println!("cargo:rustc-link-search=native={}", lib_dir.display());

    let os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    match os.as_str() {
        "windows" => {
            println!("cargo:rustc-link-lib=EAF_focuser");
        }
        "macos" => {
            println!("cargo:rustc-link-lib=static=EAFFocuser");
            println!("cargo:rustc-link-lib=c++");
            println!("cargo:rustc-link-lib=framework=IOKit");
            println!("cargo:rustc-link-lib=framework=CoreFoundation");
        }
        _ => {
            // libEAFFocuser.a is C++ and talks to the focuser over hidraw via udev
            println!("cargo:rustc-link-lib=static=EAFFocuser");
            println!("cargo:rustc-link-lib=stdc++");
            println!("cargo:rustc-link-lib=udev");
            println!("cargo:rustc-link-lib=pthread");
            println!("cargo:rustc-link-lib=rt");
        }
    }
}

/// Generate dummy bindings when the SDK is not available.
#[cfg(not(feature = "eaf-sdk"))]
fn generate_dummy_bindings() {
    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let dummy = r#"
// Dummy bindings - eaf-sdk feature not enabled
//
// Types and constants mirror EAF_focuser.h. Functions are stubs that panic
// when called; the safe crate only calls them behind its `sdk` feature.

use std::os::raw::{c_char, c_float, c_int, c_uchar};

/// Device property record filled by `EAFGetProperty`
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct EAF_INFO {
    pub ID: c_int,
    pub Name: [c_char; 64],
    pub MaxStep: c_int,
}

impl Default for EAF_INFO {
    fn default() -> Self {
        Self { ID: 0, Name: [0; 64], MaxStep: 0 }
    }
}

/// 8-byte device alias / serial number
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct EAF_ID {
    pub id: [c_uchar; 8],
}

pub type EAF_SN = EAF_ID;

pub type EAF_ERROR_CODE = c_int;

pub const EAF_SUCCESS: EAF_ERROR_CODE = 0;
pub const EAF_ERROR_INVALID_INDEX: EAF_ERROR_CODE = 1;
pub const EAF_ERROR_INVALID_ID: EAF_ERROR_CODE = 2;
pub const EAF_ERROR_INVALID_VALUE: EAF_ERROR_CODE = 3;
pub const EAF_ERROR_REMOVED: EAF_ERROR_CODE = 4;
pub const EAF_ERROR_MOVING: EAF_ERROR_CODE = 5;
pub const EAF_ERROR_ERROR_STATE: EAF_ERROR_CODE = 6;
pub const EAF_ERROR_GENERAL_ERROR: EAF_ERROR_CODE = 7;
pub const EAF_ERROR_NOT_SUPPORTED: EAF_ERROR_CODE = 8;
pub const EAF_ERROR_CLOSED: EAF_ERROR_CODE = 9;
pub const EAF_ERROR_END: EAF_ERROR_CODE = -1;

const EAF_SDK_PANIC_MSG: &str = "EAF function called but eaf-sdk feature is not enabled. \
    Enable the eaf-sdk feature (or `sdk` in eaf-focuser) to link the ZWO EAF library.";

#[no_mangle]
pub unsafe extern "C" fn EAFGetNum() -> c_int {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetID(_index: c_int, _id: *mut c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFOpen(_id: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetProperty(_id: c_int, _info: *mut EAF_INFO) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFMove(_id: c_int, _step: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFStop(_id: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFIsMoving(_id: c_int, _moving: *mut bool, _hand_control: *mut bool) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetPosition(_id: c_int, _step: *mut c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFResetPostion(_id: c_int, _step: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetTemp(_id: c_int, _temp: *mut c_float) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFSetBeep(_id: c_int, _value: bool) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetBeep(_id: c_int, _value: *mut bool) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFSetMaxStep(_id: c_int, _value: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetMaxStep(_id: c_int, _value: *mut c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFStepRange(_id: c_int, _value: *mut c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFSetReverse(_id: c_int, _value: bool) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetReverse(_id: c_int, _value: *mut bool) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFSetBacklash(_id: c_int, _value: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetBacklash(_id: c_int, _value: *mut c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFClose(_id: c_int) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetSDKVersion() -> *mut c_char {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetFirmwareVersion(
    _id: c_int,
    _major: *mut c_uchar,
    _minor: *mut c_uchar,
    _build: *mut c_uchar,
) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}

#[no_mangle]
pub unsafe extern "C" fn EAFGetSerialNumber(_id: c_int, _sn: *mut EAF_SN) -> EAF_ERROR_CODE {
    panic!("{}", EAF_SDK_PANIC_MSG);
}
"#;

    std::fs::write(out_path.join("bindings.rs"), dummy).expect("Couldn't write dummy bindings!");
}
