//! Focus control in physical units.
//!
//! [`FocusModule`] drives a shared [`Focuser`] in millimetres. A move is
//! supervised: a running move is stopped first, the new one is polled until
//! the motor settles, and a focuser that refuses the move or does not
//! settle within [`ModuleConfig::move_timeout`] is disconnected so it
//! cannot keep running unattended.
//!
//! The adapter lock is only taken for individual calls and never held
//! across an `.await`, so other holders of [`FocusModule::focuser`] (a
//! script engine, a status display) stay responsive during a move.
//!
//! # Example
//!
//! ```
//! use eaf_focuser::{FocusModule, Focuser, MockDriver, ModuleConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), eaf_focuser::ModuleError> {
//! let focuser = Focuser::with_driver(Box::new(MockDriver::new()));
//! let module = FocusModule::new(focuser, ModuleConfig::default());
//!
//! module.open()?;
//! module.set_focus(1.5).await?;
//! module.set_focus_offset(0.1).await?;
//! assert!((module.focus() - 1.5).abs() < 0.01);
//! module.close();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::capabilities::Movable;
use crate::config::ModuleConfig;
use crate::focuser::{Focuser, FAILED};

/// Errors from supervised focus moves
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleError {
    /// The configured focuser could not be opened
    #[error("EAF focuser at index {index} failed to connect")]
    ConnectFailed {
        /// Enumeration index that was tried
        index: i32,
    },

    /// The focuser refused the move; it has been disconnected
    #[error("EAF refused to move to step {target}; device disconnected")]
    MoveRejected {
        /// Requested step position
        target: i32,
    },

    /// The move did not finish in time; the focuser has been disconnected
    #[error("EAF move to step {target} did not finish within {elapsed:?}; device disconnected")]
    Timeout {
        /// Requested step position
        target: i32,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// The focuser is not connected
    #[error("EAF focuser is not connected")]
    NotReady,
}

/// Motion state as reported to observatory control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Not connected
    Initializing,
    /// Connected, motor at rest
    Idle,
    /// Connected, motor running
    Slewing,
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Slewing => "slewing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct FocusState {
    /// Last known position in mm
    position: f64,
    /// Focus requested by `set_focus`
    set_point: f64,
    offset: f64,
    ready_reported: bool,
}

/// Focus control in millimetres over a shared [`Focuser`].
pub struct FocusModule {
    focuser: Arc<Mutex<Focuser>>,
    config: ModuleConfig,
    state: Mutex<FocusState>,
}

impl std::fmt::Debug for FocusModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusModule")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl FocusModule {
    /// Take ownership of an adapter.
    pub fn new(focuser: Focuser, config: ModuleConfig) -> Self {
        Self::from_shared(Arc::new(Mutex::new(focuser)), config)
    }

    /// Use an adapter that is shared with other components.
    pub fn from_shared(focuser: Arc<Mutex<Focuser>>, config: ModuleConfig) -> Self {
        Self {
            focuser,
            config,
            state: Mutex::new(FocusState::default()),
        }
    }

    /// The shared adapter.
    pub fn focuser(&self) -> Arc<Mutex<Focuser>> {
        Arc::clone(&self.focuser)
    }

    /// Module settings.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    fn steps_to_mm(&self, steps: i32) -> f64 {
        f64::from(steps) * self.config.step_to_mm
    }

    fn mm_to_steps(&self, mm: f64) -> i32 {
        (mm / self.config.step_to_mm) as i32
    }

    /// Connect the configured device and read its state.
    pub fn open(&self) -> Result<(), ModuleError> {
        let mut focuser = self.focuser.lock();
        let index = focuser.config().device_number;
        info!(index, "Opening EAF focusing device");

        if !focuser.connect_configured() {
            return Err(ModuleError::ConnectFailed { index });
        }

        let temperature = focuser.temperature();
        info!("The temperature of the EAF is {:.2}°C", temperature);

        let steps = focuser.position();
        drop(focuser);
        let position = self.steps_to_mm(steps);
        self.state.lock().position = position;
        info!("The motor position is at {:.2}mm", position);
        Ok(())
    }

    /// Disconnect the device.
    pub fn close(&self) {
        warn!("Closing USB connection to the EAF");
        self.disconnect();
    }

    fn disconnect(&self) {
        if self.focuser.lock().disconnect() {
            warn!("Disconnected EAF");
        } else {
            error!("EAF did not disconnect properly");
        }
    }

    /// Whether the focuser is connected. Logs each change of readiness once.
    pub fn is_ready(&self) -> bool {
        let connected = self.focuser.lock().is_connected();
        let mut state = self.state.lock();
        if connected != state.ready_reported {
            if connected {
                info!("EAF is connected and ready");
            } else {
                info!("EAF is not connected and not ready");
            }
            state.ready_reported = connected;
        }
        connected
    }

    /// Move to `focus` mm and clear the offset.
    ///
    /// Returns immediately, without error, if the focuser is not connected.
    pub async fn set_focus(&self, focus: f64) -> Result<(), ModuleError> {
        {
            let mut state = self.state.lock();
            state.set_point = focus;
            state.offset = 0.0;
        }
        info!("Setting focus to {:.2}mm", focus);
        self.move_focus(focus).await
    }

    /// Move to the current set point plus `offset` mm.
    pub async fn set_focus_offset(&self, offset: f64) -> Result<(), ModuleError> {
        let target = {
            let mut state = self.state.lock();
            state.offset = offset;
            state.set_point + offset
        };
        info!("Setting focus offset to {:.2}mm", offset);
        self.move_focus(target).await
    }

    async fn move_focus(&self, focus: f64) -> Result<(), ModuleError> {
        if !self.is_ready() {
            return Ok(());
        }

        let target = self.mm_to_steps(focus);
        {
            let mut focuser = self.focuser.lock();
            if focuser.is_moving() {
                focuser.stop();
            }
            if !focuser.move_to(target) {
                drop(focuser);
                self.disconnect();
                return Err(ModuleError::MoveRejected { target });
            }
        }

        self.wait_for_motion(target).await
    }

    async fn wait_for_motion(&self, target: i32) -> Result<(), ModuleError> {
        let timeout = self.config.move_timeout();
        let started = Instant::now();

        loop {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                self.disconnect();
                return Err(ModuleError::Timeout { target, elapsed });
            }

            let (moving, steps) = {
                let focuser = self.focuser.lock();
                (focuser.is_moving(), focuser.position())
            };
            if steps != FAILED {
                let position = self.steps_to_mm(steps);
                self.state.lock().position = position;
                info!("EAF focusing motor at {:.3}mm", position);
            }
            if !moving {
                return Ok(());
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// Current focus in mm, excluding the offset.
    ///
    /// Re-read from the device when connected, otherwise the last known value.
    pub fn focus(&self) -> f64 {
        if self.is_ready() {
            let steps = self.focuser.lock().position();
            if steps != FAILED {
                self.state.lock().position = self.steps_to_mm(steps);
            }
        }
        let state = self.state.lock();
        state.position - state.offset
    }

    /// Current focus offset in mm.
    pub fn focus_offset(&self) -> f64 {
        self.state.lock().offset
    }

    /// Motion state.
    pub fn motion_status(&self) -> MotionState {
        if !self.is_ready() {
            return MotionState::Initializing;
        }
        if self.focuser.lock().is_moving() {
            MotionState::Slewing
        } else {
            MotionState::Idle
        }
    }

    /// Stop the motor. Disconnects if the stop is refused.
    pub fn stop_motion(&self) -> bool {
        info!("Stopping EAF motion");
        let stopped = self.focuser.lock().stop();
        if stopped {
            info!("Stopped successfully");
        } else {
            error!("EAF did not stop; disconnecting");
            self.disconnect();
        }
        stopped
    }

    /// Stop, drive to focus 0 and disconnect.
    pub async fn park(&self) -> Result<(), ModuleError> {
        info!("Parking EAF");
        if self.is_ready() && self.focuser.lock().is_moving() {
            self.stop_motion();
        }
        self.set_focus(0.0).await?;
        if self.is_ready() {
            self.disconnect();
        }
        Ok(())
    }
}

#[async_trait]
impl Movable for FocusModule {
    async fn move_abs(&self, position: f64) -> AnyResult<()> {
        if !self.is_ready() {
            return Err(ModuleError::NotReady.into());
        }
        Ok(self.set_focus(position).await?)
    }

    async fn move_rel(&self, distance: f64) -> AnyResult<()> {
        if !self.is_ready() {
            return Err(ModuleError::NotReady.into());
        }
        let target = self.state.lock().set_point + distance;
        Ok(self.set_focus(target).await?)
    }

    async fn position(&self) -> AnyResult<f64> {
        Ok(self.focus())
    }

    async fn wait_settled(&self) -> AnyResult<()> {
        if !self.is_ready() {
            return Err(ModuleError::NotReady.into());
        }
        let target = self.mm_to_steps(self.state.lock().set_point);
        Ok(self.wait_for_motion(target).await?)
    }

    async fn stop(&self) -> AnyResult<()> {
        if self.stop_motion() {
            Ok(())
        } else {
            anyhow::bail!("EAF refused to stop")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EafError;
    use crate::mock::{ErrorScenario, MockDriver, MockMode};

    const STEP: f64 = 0.002_421_052_63;

    fn module(driver: &MockDriver) -> FocusModule {
        FocusModule::new(
            Focuser::with_driver(Box::new(driver.clone())),
            ModuleConfig::default(),
        )
    }

    fn stepped() -> MockDriver {
        MockDriver::builder()
            .mode(MockMode::Stepped { steps_per_poll: 100 })
            .build()
    }

    #[test]
    fn test_open_fails_without_device() {
        let module = module(&MockDriver::empty());
        assert_eq!(module.open(), Err(ModuleError::ConnectFailed { index: 0 }));
        assert_eq!(module.motion_status(), MotionState::Initializing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_focus_waits_for_motion() {
        let driver = stepped();
        let module = module(&driver);
        module.open().unwrap();

        let started = Instant::now();
        module.set_focus(1.0).await.unwrap();

        // 1.0mm truncates to 413 steps, 100 steps per poll
        assert_eq!(driver.motor_position(0), Some(413));
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
        assert!((module.focus() - 413.0 * STEP).abs() < 1e-9);
        assert_eq!(module.motion_status(), MotionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_moves_relative_to_set_point() {
        let driver = MockDriver::new();
        let module = module(&driver);
        module.open().unwrap();

        module.set_focus(2.0).await.unwrap();
        module.set_focus_offset(0.5).await.unwrap();
        assert_eq!(driver.motor_position(0), Some((2.5 / STEP) as i32));
        assert_eq!(module.focus_offset(), 0.5);
        // Reported focus excludes the offset
        assert!((module.focus() - 2.0).abs() < 2.0 * STEP);

        module.set_focus(1.0).await.unwrap();
        assert_eq!(module.focus_offset(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_move_is_stopped_first() {
        let driver = MockDriver::builder().mode(MockMode::Held).build();
        let module = FocusModule::new(
            Focuser::with_driver(Box::new(driver.clone())),
            ModuleConfig {
                move_timeout_secs: 1.0,
                ..Default::default()
            },
        );
        module.open().unwrap();
        assert!(module.focuser().lock().move_to(5000));

        let result = module.set_focus(1.0).await;
        let calls = driver.calls();
        let stop = calls.iter().position(|c| c == "stop(1)").unwrap();
        let moved = calls.iter().position(|c| c == "move_to(1, 413)").unwrap();
        assert!(stop < moved);
        // Held mode never settles
        assert!(matches!(result, Err(ModuleError::Timeout { target: 413, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_disconnects() {
        let driver = MockDriver::builder().mode(MockMode::Held).build();
        let module = FocusModule::new(
            Focuser::with_driver(Box::new(driver.clone())),
            ModuleConfig {
                move_timeout_secs: 2.0,
                ..Default::default()
            },
        );
        module.open().unwrap();

        let err = module.set_focus(3.0).await.unwrap_err();
        match err {
            ModuleError::Timeout { elapsed, .. } => {
                assert!(elapsed > Duration::from_secs(2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!driver.is_open(0));
        assert!(!module.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_move_disconnects() {
        let driver = MockDriver::new();
        let module = module(&driver);
        module.open().unwrap();

        // Far beyond the 60000-step travel
        let err = module.set_focus(1000.0).await.unwrap_err();
        assert!(matches!(err, ModuleError::MoveRejected { .. }));
        assert!(!driver.is_open(0));
        assert_eq!(module.motion_status(), MotionState::Initializing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_focus_when_not_ready_is_a_no_op() {
        let driver = MockDriver::new();
        let module = module(&driver);
        module.set_focus(1.0).await.unwrap();
        assert_eq!(driver.motor_position(0), Some(0));
        assert!(!driver.calls().iter().any(|c| c.starts_with("move_to")));
    }

    #[test]
    fn test_stop_motion_failure_disconnects() {
        let driver = MockDriver::builder()
            .scenario(ErrorScenario::AlwaysFail {
                operation: "stop",
                error: EafError::ErrorState,
            })
            .build();
        let module = module(&driver);
        module.open().unwrap();
        assert!(!module.stop_motion());
        assert!(!module.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_park() {
        let driver = stepped();
        let module = module(&driver);
        module.open().unwrap();
        module.set_focus(0.5).await.unwrap();

        module.park().await.unwrap();
        assert_eq!(driver.motor_position(0), Some(0));
        assert!(!driver.is_open(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_movable_capability() {
        let driver = MockDriver::new();
        let module = module(&driver);
        let movable: &dyn Movable = &module;

        assert!(movable.move_abs(1.0).await.is_err());

        module.open().unwrap();
        movable.move_abs(1.0).await.unwrap();
        movable.move_rel(0.5).await.unwrap();
        movable.wait_settled().await.unwrap();
        let position = movable.position().await.unwrap();
        assert!((position - 1.5).abs() < 2.0 * STEP);
        movable.stop().await.unwrap();
    }

    #[test]
    fn test_motion_state_display() {
        assert_eq!(MotionState::Slewing.to_string(), "slewing");
        assert_eq!(MotionState::Initializing.to_string(), "initializing");
    }
}
