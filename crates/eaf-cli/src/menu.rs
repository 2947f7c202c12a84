//! Interactive menu.
//!
//! Generic over its input and output so it runs the same against a
//! terminal or an in-memory script of keystrokes.

use std::io::{self, BufRead, Write};

use eaf_focuser::Focuser;

use crate::commands;

/// Menu commands, keyed by the digit the user types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `1` - move to a position, stopping a running move first
    Move,
    /// `2` - stop
    Stop,
    /// `3` - overwrite the position counter
    SetPosition,
    /// `4` - set the maximum step
    MaxStep,
    /// `5` - toggle the beep
    ToggleSound,
    /// `6` - toggle the direction
    ToggleDirection,
    /// `7` - set the backlash
    Backlash,
    /// Empty line, redraw
    Refresh,
    /// `0` - quit
    Quit,
}

impl Command {
    /// Parse a menu entry. `None` for anything unrecognized.
    pub fn parse(input: &str) -> Option<Self> {
        let cmd = match input.trim() {
            "1" => Self::Move,
            "2" => Self::Stop,
            "3" => Self::SetPosition,
            "4" => Self::MaxStep,
            "5" => Self::ToggleSound,
            "6" => Self::ToggleDirection,
            "7" => Self::Backlash,
            "0" => Self::Quit,
            "" => Self::Refresh,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Menu over a line-based input and an output stream.
pub struct Menu<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Menu<R, W> {
    /// Create a menu.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the output stream.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `text` and read one line. `None` at end of input.
    fn prompt(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Prompt until the user enters an integer. `None` at end of input.
    fn prompt_int(&mut self, text: &str) -> io::Result<Option<i32>> {
        loop {
            let Some(line) = self.prompt(text)? else {
                return Ok(None);
            };
            match line.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "Not a number: {:?}", line)?,
            }
        }
    }

    /// Ask for the device index; an empty line selects `default`.
    pub fn ask_device(&mut self, default: i32) -> io::Result<Option<i32>> {
        loop {
            let text = format!("Enter device number [{}]: ", default);
            let Some(line) = self.prompt(&text)? else {
                return Ok(None);
            };
            if line.is_empty() {
                return Ok(Some(default));
            }
            match line.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "Not a number: {:?}", line)?,
            }
        }
    }

    /// Print device state and the command list.
    pub fn show(&mut self, focuser: &mut Focuser) -> io::Result<()> {
        writeln!(self.output)?;
        commands::print_status(focuser, &mut self.output)?;
        writeln!(self.output, "(1) Move")?;
        writeln!(self.output, "(2) Stop")?;
        writeln!(self.output, "(3) Set current position")?;
        writeln!(self.output, "(4) Maximal step: {}", focuser.maximal_step())?;
        writeln!(self.output, "(5) Sound:        {}", focuser.sound())?;
        writeln!(self.output, "(6) Direction:    {}", focuser.direction())?;
        writeln!(self.output, "(7) Backlash:     {}", focuser.backlash())?;
        writeln!(self.output, "(0) Quit")?;
        Ok(())
    }

    /// Show the menu, read one command and run it. False once the user quits.
    pub fn step(&mut self, focuser: &mut Focuser) -> io::Result<bool> {
        self.show(focuser)?;

        let command = loop {
            let Some(line) = self.prompt("Enter command [0-7]: ")? else {
                return Ok(false);
            };
            if let Some(command) = Command::parse(&line) {
                break command;
            }
        };

        match command {
            Command::Move => {
                if let Some(target) = self.prompt_int("Enter new position: ")? {
                    if focuser.is_moving() {
                        focuser.stop();
                    }
                    if !focuser.move_to(target) {
                        writeln!(self.output, "Move to {} refused", target)?;
                    }
                }
            }
            Command::Stop => {
                focuser.stop();
            }
            Command::SetPosition => {
                if let Some(position) = self.prompt_int("Enter current position: ")? {
                    focuser.reset_position(position);
                }
            }
            Command::MaxStep => {
                if let Some(steps) = self.prompt_int("Enter maximum position: ")? {
                    focuser.set_maximal_step(steps);
                }
            }
            Command::ToggleSound => {
                let sound = focuser.sound();
                focuser.set_sound(!sound);
            }
            Command::ToggleDirection => {
                let direction = focuser.direction();
                focuser.set_direction(!direction);
            }
            Command::Backlash => {
                if let Some(steps) = self.prompt_int("Enter new backlash: ")? {
                    focuser.set_backlash(steps);
                }
            }
            Command::Refresh => {}
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Loop until the user quits or input ends.
    pub fn run(&mut self, focuser: &mut Focuser) -> io::Result<()> {
        while self.step(focuser)? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eaf_focuser::{MockDriver, MockMode};
    use std::io::Cursor;

    fn run_menu(driver: &MockDriver, keys: &str) -> (Focuser, String) {
        let mut focuser = Focuser::with_driver(Box::new(driver.clone()));
        assert!(focuser.connect(0));
        let mut menu = Menu::new(Cursor::new(keys.to_string()), Vec::new());
        menu.run(&mut focuser).unwrap();
        let output = String::from_utf8(menu.into_output()).unwrap();
        (focuser, output)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("1"), Some(Command::Move));
        assert_eq!(Command::parse(" 7 \n"), Some(Command::Backlash));
        assert_eq!(Command::parse(""), Some(Command::Refresh));
        assert_eq!(Command::parse("0"), Some(Command::Quit));
        assert_eq!(Command::parse("8"), None);
        assert_eq!(Command::parse("move"), None);
    }

    #[test]
    fn test_quit_immediately() {
        let driver = MockDriver::new();
        let (_, output) = run_menu(&driver, "0\n");
        assert!(output.contains("Temperature:      18.50°C"));
        assert!(output.contains("(4) Maximal step: 60000"));
        assert!(output.contains("(0) Quit"));
    }

    #[test]
    fn test_end_of_input_quits() {
        let driver = MockDriver::new();
        let (_, output) = run_menu(&driver, "");
        assert!(output.ends_with("Enter command [0-7]: "));
    }

    #[test]
    fn test_move_command() {
        let driver = MockDriver::new();
        let (mut focuser, _) = run_menu(&driver, "1\n4200\n0\n");
        assert_eq!(focuser.position(), 4200);
        assert_eq!(driver.motor_position(0), Some(4200));
        assert!(!focuser.is_moving());
    }

    #[test]
    fn test_move_stops_running_motion_first() {
        let driver = MockDriver::builder().mode(MockMode::Held).build();
        let mut focuser = Focuser::with_driver(Box::new(driver.clone()));
        assert!(focuser.connect(0));
        assert!(focuser.move_to(9000));

        let mut menu = Menu::new(Cursor::new("1\n300\n0\n"), Vec::new());
        menu.run(&mut focuser).unwrap();
        assert_eq!(driver.motor_target(0), Some(300));
    }

    #[test]
    fn test_invalid_input_reprompts() {
        let driver = MockDriver::new();
        let (mut focuser, output) = run_menu(&driver, "9\n7\nlots\n25\n0\n");
        assert!(output.contains("Not a number: \"lots\""));
        assert_eq!(focuser.backlash(), 25);
    }

    #[test]
    fn test_settings_commands() {
        let driver = MockDriver::new();
        let (mut focuser, output) = run_menu(&driver, "3\n150\n4\n30000\n5\n6\n\n0\n");
        assert_eq!(focuser.position(), 150);
        assert_eq!(focuser.maximal_step(), 30_000);
        assert!(!focuser.sound());
        assert!(focuser.direction());
        // Redrawn after each command, including the empty refresh
        assert_eq!(output.matches("(0) Quit").count(), 6);
    }

    #[test]
    fn test_refused_move_is_reported() {
        let driver = MockDriver::new();
        let (_, output) = run_menu(&driver, "1\n999999\n0\n");
        assert!(output.contains("Move to 999999 refused"));
    }

    #[test]
    fn test_ask_device() {
        let mut menu = Menu::new(Cursor::new("\nx\n2\n"), Vec::new());
        assert_eq!(menu.ask_device(0).unwrap(), Some(0));
        assert_eq!(menu.ask_device(0).unwrap(), Some(2));
        assert_eq!(menu.ask_device(0).unwrap(), None);
    }
}
