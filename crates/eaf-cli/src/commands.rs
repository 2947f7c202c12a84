//! One-shot subcommands.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use eaf_focuser::{FocusModule, Focuser, FAILED};
use tracing::info;

/// Print temperature, step range, motion and position.
pub fn print_status<W: Write>(focuser: &Focuser, out: &mut W) -> io::Result<()> {
    writeln!(out, "Temperature:      {:.2}°C", focuser.temperature())?;
    writeln!(out, "Step range:       {}", focuser.step_range())?;
    writeln!(out, "Is moving:        {}", focuser.is_moving())?;
    writeln!(out, "Position:         {}", focuser.position())?;
    Ok(())
}

/// Print identification and the status block.
pub fn status<W: Write>(focuser: &mut Focuser, out: &mut W) -> Result<()> {
    if let Some(info) = focuser.info() {
        writeln!(out, "Device:           {} (id {})", info.name, info.id)?;
    }
    writeln!(out, "SDK version:      {}", focuser.sdk_version())?;
    if let Some(firmware) = focuser.firmware_version() {
        writeln!(out, "Firmware:         {}", firmware)?;
    }
    if let Some(serial) = focuser.serial_number() {
        writeln!(out, "Serial number:    {}", serial)?;
    }
    print_status(focuser, out)?;
    writeln!(out, "Maximal step:     {}", focuser.maximal_step())?;
    writeln!(out, "Backlash:         {}", focuser.backlash())?;
    writeln!(out, "Sound:            {}", focuser.sound())?;
    writeln!(out, "Direction:        {}", focuser.direction())?;
    Ok(())
}

/// Move to `target` steps, stopping a running move first. With `wait`,
/// poll until the motor stops and return the final position.
pub fn move_to(
    focuser: &mut Focuser,
    target: i32,
    wait: Option<(Duration, Duration)>,
) -> Result<i32> {
    if focuser.is_moving() {
        focuser.stop();
    }
    if !focuser.move_to(target) {
        bail!("Focuser refused to move to {}", target);
    }
    info!(target, "Move started");

    let Some((timeout, poll)) = wait else {
        return Ok(target);
    };

    let started = Instant::now();
    while focuser.is_moving() {
        if started.elapsed() > timeout {
            focuser.stop();
            bail!("Move to {} did not finish within {:?}", target, timeout);
        }
        thread::sleep(poll);
    }

    let position = focuser.position();
    if position == FAILED {
        bail!("Could not read the final position");
    }
    Ok(position)
}

/// Supervised move to `mm`, returning the reached focus.
pub async fn focus(module: &FocusModule, mm: f64) -> Result<f64> {
    module.open()?;
    module.set_focus(mm).await?;
    let reached = module.focus();
    module.close();
    Ok(reached)
}

/// Drive to focus 0 and disconnect.
pub async fn park(module: &FocusModule) -> Result<()> {
    module.open()?;
    module.park().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eaf_focuser::{MockDriver, MockMode, ModuleConfig};

    fn connected(driver: &MockDriver) -> Focuser {
        let mut focuser = Focuser::with_driver(Box::new(driver.clone()));
        assert!(focuser.connect(0));
        focuser
    }

    #[test]
    fn test_status_output() {
        let driver = MockDriver::new();
        let mut focuser = connected(&driver);
        let mut out = Vec::new();
        status(&mut focuser, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Device:           EAF (id 1)"));
        assert!(text.contains("Serial number:    eaf0000000000001"));
        assert!(text.contains("Step range:       100000"));
        assert!(text.contains("Maximal step:     60000"));
    }

    #[test]
    fn test_status_when_disconnected() {
        let focuser = Focuser::with_driver(Box::new(MockDriver::new()));
        let mut out = Vec::new();
        print_status(&focuser, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Temperature:      NaN°C"));
        assert!(text.contains("Position:         -1"));
    }

    #[test]
    fn test_move_and_wait() {
        let driver = MockDriver::builder()
            .mode(MockMode::Stepped { steps_per_poll: 300 })
            .build();
        let mut focuser = connected(&driver);
        let wait = Some((Duration::from_secs(5), Duration::from_millis(1)));
        assert_eq!(move_to(&mut focuser, 1000, wait).unwrap(), 1000);
    }

    #[test]
    fn test_move_timeout_stops_motor() {
        let driver = MockDriver::builder().mode(MockMode::Held).build();
        let mut focuser = connected(&driver);
        let wait = Some((Duration::from_millis(10), Duration::from_millis(1)));
        let err = move_to(&mut focuser, 1000, wait).unwrap_err();
        assert!(err.to_string().contains("did not finish"));
        assert_eq!(driver.motor_target(0), None);
    }

    #[test]
    fn test_move_refused() {
        let driver = MockDriver::new();
        let mut focuser = connected(&driver);
        assert!(move_to(&mut focuser, -5, None).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_and_park() {
        let driver = MockDriver::new();
        let module = FocusModule::new(
            Focuser::with_driver(Box::new(driver.clone())),
            ModuleConfig::default(),
        );

        let reached = focus(&module, 1.0).await.unwrap();
        assert!((reached - 1.0).abs() < 0.01);
        assert!(!driver.is_open(0));

        park(&module).await.unwrap();
        assert_eq!(driver.motor_position(0), Some(0));
        assert!(!driver.is_open(0));
    }
}
