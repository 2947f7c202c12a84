//! Rhai scripting for the ZWO EAF focuser.
//!
//! [`focuser_engine`] builds an [`Engine`] with the `Focuser` type
//! registered; [`run_script`] evaluates a script with a handle bound to the
//! variable `focuser`.
//!
//! ```
//! use eaf_focuser::{Focuser, MockDriver};
//! use eaf_scripting::{focuser_engine, run_script, FocuserHandle};
//!
//! let engine = focuser_engine();
//! let handle = FocuserHandle::new(Focuser::with_driver(Box::new(MockDriver::new())));
//!
//! let position = run_script(&engine, handle, r#"
//!     focuser.connect(0);
//!     focuser.move_to(2500);
//!     focuser.wait_idle(1000)
//! "#)?;
//! assert_eq!(position.as_int().ok(), Some(2500));
//! # Ok::<(), eaf_scripting::ScriptError>(())
//! ```

pub mod focuser_bindings;

pub use focuser_bindings::{register_focuser, FocuserHandle};
pub use rhai;

use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use thiserror::Error;

/// Name under which [`run_script`] binds the focuser handle.
pub const FOCUSER_VAR: &str = "focuser";

/// Script failures
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Script did not parse or raised an error
    #[error("Script evaluation failed: {0}")]
    Eval(#[from] Box<EvalAltResult>),
}

/// Wrap a labelled error as a Rhai runtime error.
pub fn rhai_error(label: &str, error: impl std::fmt::Display) -> Box<EvalAltResult> {
    format!("{}: {}", label, error).into()
}

/// Engine with the focuser API registered.
pub fn focuser_engine() -> Engine {
    let mut engine = Engine::new();
    register_focuser(&mut engine);
    engine
}

/// Evaluate `script` with `handle` bound to `focuser`.
pub fn run_script(
    engine: &Engine,
    handle: FocuserHandle,
    script: &str,
) -> Result<Dynamic, ScriptError> {
    let mut scope = Scope::new();
    scope.push(FOCUSER_VAR, handle);
    Ok(engine.eval_with_scope::<Dynamic>(&mut scope, script)?)
}
