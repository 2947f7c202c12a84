//! Capability traits for motion devices
//!
//! Code that only needs to move something along one axis (an autofocus
//! routine, a scan script) takes `&dyn Movable` and works with any focuser,
//! simulated or real.

use anyhow::Result;
use async_trait::async_trait;

/// Capability: Motion Control
///
/// # Contract
/// - Positions are in device-native units (mm for focusers)
/// - `move_abs` and `move_rel` may return before motion completes
/// - `wait_settled` waits until motion completes, bounded by a timeout
/// - `position` may be approximate during motion
///
/// All methods take `&self`; implementations use interior mutability.
#[async_trait]
pub trait Movable: Send + Sync {
    /// Move to an absolute position.
    async fn move_abs(&self, position: f64) -> Result<()>;

    /// Move relative to the current position.
    async fn move_rel(&self, distance: f64) -> Result<()>;

    /// Current position.
    async fn position(&self) -> Result<f64>;

    /// Wait for motion to settle.
    async fn wait_settled(&self) -> Result<()>;

    /// Stop motion immediately.
    ///
    /// The default implementation reports that stopping is unsupported.
    async fn stop(&self) -> Result<()> {
        anyhow::bail!("Stop not supported by this device")
    }
}
