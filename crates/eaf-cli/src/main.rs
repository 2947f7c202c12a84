//! CLI Entry Point for the EAF focuser
//!
//! # Usage
//!
//! Interactive menu (the default):
//! ```bash
//! eaf
//! eaf --device 1 menu
//! ```
//!
//! One-shot commands:
//! ```bash
//! eaf status
//! eaf move 15000 --wait
//! eaf focus 2.5
//! eaf run sweep.rhai
//! ```
//!
//! Without the `sdk` feature, or with `--simulate`, a simulated focuser is
//! used.

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod menu;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eaf_focuser::{logging, EafConfig, EafDriver, FocusModule, Focuser, MockDriver};
use eaf_scripting::{focuser_engine, run_script, FocuserHandle};
use tracing::{info, warn};

use crate::menu::Menu;

#[derive(Parser, Debug)]
#[command(name = "eaf")]
#[command(about = "Control a ZWO EAF focuser", long_about = None, version)]
struct Cli {
    /// Configuration file (TOML). Defaults to ./eaf.toml if present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device index, overriding the configuration
    #[arg(long, global = true)]
    device: Option<i32>,

    /// Use a simulated focuser
    #[arg(long, global = true)]
    simulate: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Commands {
    /// Interactive menu
    Menu,

    /// Print device information and state
    Status,

    /// Move to an absolute step position
    Move {
        /// Target position in steps
        position: i32,

        /// Wait until the motor stops
        #[arg(long)]
        wait: bool,
    },

    /// Stop a running move
    Stop,

    /// Supervised move to a focus value in mm
    Focus {
        /// Target focus in mm
        mm: f64,
    },

    /// Drive to focus 0 and disconnect
    Park,

    /// Run a Rhai script with the focuser bound to `focuser`
    Run {
        /// Path to .rhai script file
        script: PathBuf,
    },
}

/// Load the configuration and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<EafConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file {} not found", path.display());
            }
            EafConfig::load_from(path)
        }
        None => EafConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(device) = cli.device {
        config.focuser.device_number = device;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn make_driver(simulate: bool) -> Box<dyn EafDriver> {
    if simulate {
        return Box::new(MockDriver::new());
    }
    if cfg!(not(feature = "sdk")) {
        warn!("Built without the `sdk` feature; using a simulated focuser");
    }
    eaf_focuser::default_driver()
}

/// Connect device `index`, run `f`, and disconnect whether or not `f` succeeded.
fn with_device<T>(
    focuser: &mut Focuser,
    index: i32,
    f: impl FnOnce(&mut Focuser) -> Result<T>,
) -> Result<T> {
    if !focuser.connect(index) {
        bail!("Could not connect to device {}", index);
    }
    let result = f(focuser);
    focuser.disconnect();
    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    logging::init(&config.logging)?;

    let driver = make_driver(cli.simulate);
    info!(sdk = %driver.sdk_version(), "EAF SDK loaded");
    let mut focuser = Focuser::new(driver, config.focuser.clone());
    let index = config.focuser.device_number;
    let mut stdout = io::stdout().lock();

    match cli.command.clone().unwrap_or(Commands::Menu) {
        Commands::Menu => {
            let mut menu = Menu::new(io::stdin().lock(), &mut stdout);
            let index = match cli.device {
                Some(index) => index,
                None => match menu.ask_device(index)? {
                    Some(index) => index,
                    None => return Ok(()),
                },
            };
            println!("Connecting to device {}...", index);
            with_device(&mut focuser, index, |focuser| {
                println!("Connected to device {}.", index);
                Ok(menu.run(focuser)?)
            })?;
        }
        Commands::Status => {
            with_device(&mut focuser, index, |focuser| {
                commands::status(focuser, &mut stdout)
            })?;
        }
        Commands::Move { position, wait } => {
            let wait = wait.then(|| (config.module.move_timeout(), config.module.poll_interval()));
            let reached = with_device(&mut focuser, index, |focuser| {
                commands::move_to(focuser, position, wait)
            })?;
            println!("Position: {}", reached);
        }
        Commands::Stop => {
            with_device(&mut focuser, index, |focuser| {
                if !focuser.stop() {
                    bail!("Focuser refused to stop");
                }
                Ok(())
            })?;
        }
        Commands::Focus { mm } => {
            let module = FocusModule::new(focuser, config.module.clone());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            let reached = runtime.block_on(commands::focus(&module, mm))?;
            println!("Focus: {:.4} mm", reached);
        }
        Commands::Park => {
            let module = FocusModule::new(focuser, config.module.clone());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(commands::park(&module))?;
            println!("Parked");
        }
        Commands::Run { script } => {
            let source = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read {}", script.display()))?;
            let engine = focuser_engine();
            let result = run_script(&engine, FocuserHandle::new(focuser), &source)?;
            if !result.is_unit() {
                println!("{}", result);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_menu() {
        let cli = Cli::try_parse_from(["eaf"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.simulate);
    }

    #[test]
    fn test_parse_move() {
        let cli = Cli::try_parse_from(["eaf", "--simulate", "move", "1200", "--wait"]).unwrap();
        assert!(cli.simulate);
        assert_eq!(
            cli.command,
            Some(Commands::Move {
                position: 1200,
                wait: true
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["eaf", "status", "--device", "2"]).unwrap();
        assert_eq!(cli.device, Some(2));
        assert_eq!(cli.command, Some(Commands::Status));
    }

    #[test]
    fn test_resolve_config_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eaf.toml");
        std::fs::write(&path, "[focuser]\nbacklash = 12\ndevice_number = 1\n").unwrap();

        let cli = Cli::try_parse_from([
            "eaf",
            "--config",
            path.to_str().unwrap(),
            "--device",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.focuser.backlash, 12);
        assert_eq!(config.focuser.device_number, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_resolve_config_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eaf.toml");
        std::fs::write(&path, "[focuser]\nbacklash = -4\n").unwrap();

        let cli = Cli::try_parse_from(["eaf", "--config", path.to_str().unwrap()]).unwrap();
        assert!(resolve_config(&cli).is_err());

        let missing = dir.path().join("missing.toml");
        let cli = Cli::try_parse_from(["eaf", "--config", missing.to_str().unwrap()]).unwrap();
        assert!(resolve_config(&cli).is_err());
    }

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_device_closed_when_command_fails() {
        let driver = MockDriver::new();
        let mut focuser = Focuser::with_driver(Box::new(driver.clone()));

        let result = with_device(&mut focuser, 0, |focuser| {
            commands::status(focuser, &mut BrokenPipe)
        });
        assert!(result.is_err());
        assert!(!driver.is_open(0));
        assert!(!focuser.is_connected());
    }

    #[test]
    fn test_device_closed_when_menu_output_fails() {
        let driver = MockDriver::new();
        let mut focuser = Focuser::with_driver(Box::new(driver.clone()));
        let mut menu = Menu::new(io::Cursor::new("0\n"), BrokenPipe);

        let result = with_device(&mut focuser, 0, |focuser| Ok(menu.run(focuser)?));
        assert!(result.is_err());
        assert!(!driver.is_open(0));
    }

    #[test]
    fn test_with_device_reports_connect_failure() {
        let driver = MockDriver::empty();
        let mut focuser = Focuser::with_driver(Box::new(driver));
        let err = with_device(&mut focuser, 0, |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("Could not connect to device 0"));
    }

    #[test]
    fn test_simulated_driver() {
        let driver = make_driver(true);
        assert_eq!(driver.device_count(), 1);
    }
}
