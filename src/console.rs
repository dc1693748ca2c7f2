//! Interactive console
//!
//! Turns one typed line into a request for the engine. Arguments are
//! positional (`write_parameter 11 120`) or named (`move_relative x=600
//! y=100 z=4`); a named argument wins over the positional one at the same
//! slot.

use fbserial_communication::DeviceCommand;
use fbserial_core::{CommandError, StatusKey, StatusValue};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Console usage text
pub const HELP: &str = "\
Commands:
  move_relative [x=<n>] [y=<n>] [z=<n>] [speed=<n>]
  move_absolute x=<n> y=<n> z=<n> [speed=<n>]
  move_steps x=<n> y=<n> z=<n>
  home_x | home_y | home_z | home_all
  calibrate_x | calibrate_y | calibrate_z
  read_parameter <id>
  write_parameter <id> <value>
  read_pin <pin> [digital|analog]
  write_pin <pin> <value> [digital|analog]
  set_pin_mode <pin> <digital|analog>
  pulse_pin <pin> <value1> <value2> <time> [digital|analog]
  servo_move <pin> <value>
  dose_water <amount>
  read_status <id>
  read_end_stops | read_position | read_version
  set_max_speed | set_acceleration | set_timeout <axis> <value>
  set_end_inversion | set_motor_inversion <axis> <true|false>
  emergency_stop
  check_parameters
  status
  help
  quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Forward to the engine
    Device(DeviceCommand),
    /// Run parameter reconciliation
    CheckParameters,
    /// Print the status snapshot
    Status,
    /// Print usage
    Help,
    /// Leave the console
    Quit,
}

struct Args<'a> {
    command: &'a str,
    positional: Vec<&'a str>,
    named: HashMap<String, &'a str>,
}

impl<'a> Args<'a> {
    fn new(command: &'a str, tokens: impl Iterator<Item = &'a str>) -> Self {
        let mut positional = Vec::new();
        let mut named = HashMap::new();
        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    named.insert(key.to_ascii_lowercase(), value);
                }
                None => positional.push(token),
            }
        }
        Self {
            command,
            positional,
            named,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CommandError {
        CommandError::InvalidArgument {
            command: self.command.to_string(),
            reason: reason.into(),
        }
    }

    fn text(&self, key: &str, index: usize) -> Option<&'a str> {
        self.named
            .get(key)
            .copied()
            .or_else(|| self.positional.get(index).copied())
    }

    fn required_text(&self, key: &str, index: usize) -> Result<&'a str, CommandError> {
        self.text(key, index)
            .ok_or_else(|| self.invalid(format!("missing {}", key)))
    }

    fn number<N: FromStr>(&self, key: &str, index: usize) -> Result<N, CommandError> {
        let text = self.required_text(key, index)?;
        text.parse()
            .map_err(|_| self.invalid(format!("{} must be a number, got '{}'", key, text)))
    }

    fn optional_number<N: FromStr>(
        &self,
        key: &str,
        index: usize,
    ) -> Result<Option<N>, CommandError> {
        match self.text(key, index) {
            Some(_) => self.number(key, index).map(Some),
            None => Ok(None),
        }
    }

    fn mode(&self, index: usize) -> String {
        self.text("mode", index).unwrap_or("digital").to_string()
    }
}

/// Parse one console line; `None` for a blank line
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut tokens = line.split_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };
    let name = name.to_ascii_lowercase();
    let args = Args::new(&name, tokens);

    let device = |command: DeviceCommand| -> Result<Option<ConsoleCommand>, CommandError> {
        Ok(Some(ConsoleCommand::Device(command)))
    };
    let axis_value = |args: &Args<'_>| -> Result<(String, i64), CommandError> {
        Ok((args.required_text("axis", 0)?.to_string(), args.number("value", 1)?))
    };
    let axis_flag = |args: &Args<'_>| -> Result<(String, String), CommandError> {
        Ok((
            args.required_text("axis", 0)?.to_string(),
            args.required_text("value", 1)?.to_string(),
        ))
    };

    match name.as_str() {
        // An omitted axis stays where it is.
        "move_relative" => device(DeviceCommand::MoveRelative {
            x: args.optional_number("x", 0)?.unwrap_or(0),
            y: args.optional_number("y", 1)?.unwrap_or(0),
            z: args.optional_number("z", 2)?.unwrap_or(0),
            speed: args.optional_number("speed", 3)?,
        }),
        "move_absolute" => device(DeviceCommand::MoveAbsolute {
            x: args.number("x", 0)?,
            y: args.number("y", 1)?,
            z: args.number("z", 2)?,
            speed: args.optional_number("speed", 3)?,
        }),
        "move_steps" => device(DeviceCommand::MoveSteps {
            x: args.number("x", 0)?,
            y: args.number("y", 1)?,
            z: args.number("z", 2)?,
        }),
        "home" => device(DeviceCommand::Home {
            axis: args.required_text("axis", 0)?.to_string(),
        }),
        "home_x" | "home_y" | "home_z" | "home_all" => device(DeviceCommand::Home {
            axis: name["home_".len()..].to_string(),
        }),
        "calibrate" => device(DeviceCommand::Calibrate {
            axis: args.required_text("axis", 0)?.to_string(),
        }),
        "calibrate_x" | "calibrate_y" | "calibrate_z" => device(DeviceCommand::Calibrate {
            axis: name["calibrate_".len()..].to_string(),
        }),
        "read_parameter" => device(DeviceCommand::ReadParameter {
            id: args.number("id", 0)?,
        }),
        "write_parameter" => device(DeviceCommand::WriteParameter {
            id: args.number("id", 0)?,
            value: args.number("value", 1)?,
        }),
        "read_pin" => device(DeviceCommand::ReadPin {
            pin: args.number("pin", 0)?,
            mode: args.mode(1),
        }),
        "write_pin" => device(DeviceCommand::WritePin {
            pin: args.number("pin", 0)?,
            value: args.number("value", 1)?,
            mode: args.mode(2),
        }),
        "set_pin_mode" => device(DeviceCommand::SetPinMode {
            pin: args.number("pin", 0)?,
            mode: args.required_text("mode", 1)?.to_string(),
        }),
        "pulse_pin" => device(DeviceCommand::PulsePin {
            pin: args.number("pin", 0)?,
            value1: args.number("value1", 1)?,
            value2: args.number("value2", 2)?,
            time: args.number("time", 3)?,
            mode: args.mode(4),
        }),
        "servo_move" => device(DeviceCommand::ServoMove {
            pin: args.number("pin", 0)?,
            value: args.number("value", 1)?,
        }),
        "dose_water" => device(DeviceCommand::DoseWater {
            amount: args.number("amount", 0)?,
        }),
        "read_status" => device(DeviceCommand::ReadStatus {
            id: args.number("id", 0)?,
        }),
        "read_end_stops" => device(DeviceCommand::ReadEndStops),
        "read_position" => device(DeviceCommand::ReadPosition),
        "read_version" => device(DeviceCommand::ReadVersion),
        "set_max_speed" => {
            let (axis, value) = axis_value(&args)?;
            device(DeviceCommand::SetMaxSpeed { axis, value })
        }
        "set_acceleration" => {
            let (axis, value) = axis_value(&args)?;
            device(DeviceCommand::SetAcceleration { axis, value })
        }
        "set_timeout" => {
            let (axis, value) = axis_value(&args)?;
            device(DeviceCommand::SetTimeout { axis, value })
        }
        "set_steps_per_mm" => {
            let (axis, value) = axis_value(&args)?;
            device(DeviceCommand::SetStepsPerMm { axis, value })
        }
        "set_end_inversion" => {
            let (axis, value) = axis_flag(&args)?;
            device(DeviceCommand::SetEndInversion { axis, value })
        }
        "set_motor_inversion" => {
            let (axis, value) = axis_flag(&args)?;
            device(DeviceCommand::SetMotorInversion { axis, value })
        }
        "set_negative_coordinates" => {
            let (axis, value) = axis_flag(&args)?;
            device(DeviceCommand::SetNegativeCoordinates { axis, value })
        }
        "emergency_stop" | "e" => device(DeviceCommand::EmergencyStop),
        "check_parameters" => Ok(Some(ConsoleCommand::CheckParameters)),
        "status" => Ok(Some(ConsoleCommand::Status)),
        "help" | "?" => Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" => Ok(Some(ConsoleCommand::Quit)),
        _ => Err(CommandError::UnknownCommand {
            name: args.command.to_string(),
        }),
    }
}

/// One `key: value` line per status entry
pub fn format_status(status: &BTreeMap<StatusKey, StatusValue>) -> String {
    status
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ConsoleCommand {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_named_move() {
        assert_eq!(
            parse("move_relative x=600 y=100 z=4"),
            ConsoleCommand::Device(DeviceCommand::MoveRelative {
                x: 600,
                y: 100,
                z: 4,
                speed: None,
            })
        );
        assert_eq!(
            parse("MOVE_ABSOLUTE 1 2 3 speed=50"),
            ConsoleCommand::Device(DeviceCommand::MoveAbsolute {
                x: 1,
                y: 2,
                z: 3,
                speed: Some(50),
            })
        );
    }

    #[test]
    fn test_relative_move_defaults_missing_axes() {
        assert_eq!(
            parse("move_relative y=-600"),
            ConsoleCommand::Device(DeviceCommand::MoveRelative {
                x: 0,
                y: -600,
                z: 0,
                speed: None,
            })
        );
        assert_eq!(
            parse("move_relative speed=30 z=5"),
            ConsoleCommand::Device(DeviceCommand::MoveRelative {
                x: 0,
                y: 0,
                z: 5,
                speed: Some(30),
            })
        );
        assert!(parse_line("move_absolute y=-600").is_err());
    }

    #[test]
    fn test_positional_arguments() {
        assert_eq!(
            parse("write_parameter 11 120"),
            ConsoleCommand::Device(DeviceCommand::WriteParameter { id: 11, value: 120 })
        );
        assert_eq!(
            parse("write_pin 8 1 1"),
            ConsoleCommand::Device(DeviceCommand::WritePin {
                pin: 8,
                value: 1,
                mode: "1".to_string(),
            })
        );
        assert_eq!(
            parse("read_pin 8"),
            ConsoleCommand::Device(DeviceCommand::ReadPin {
                pin: 8,
                mode: "digital".to_string(),
            })
        );
        assert_eq!(
            parse("set_max_speed x 800"),
            ConsoleCommand::Device(DeviceCommand::SetMaxSpeed {
                axis: "x".to_string(),
                value: 800,
            })
        );
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(
            parse("home_all"),
            ConsoleCommand::Device(DeviceCommand::Home {
                axis: "all".to_string()
            })
        );
        assert_eq!(
            parse("calibrate_z"),
            ConsoleCommand::Device(DeviceCommand::Calibrate {
                axis: "z".to_string()
            })
        );
        assert_eq!(parse("e"), ConsoleCommand::Device(DeviceCommand::EmergencyStop));
        assert_eq!(parse("check_parameters"), ConsoleCommand::CheckParameters);
        assert_eq!(parse("status"), ConsoleCommand::Status);
        assert_eq!(parse("quit"), ConsoleCommand::Quit);
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_line("fly_away").unwrap_err(),
            CommandError::UnknownCommand {
                name: "fly_away".to_string()
            }
        );
        let err = parse_line("move_relative x=1 y=two z=3").unwrap_err();
        assert!(err.to_string().contains("y must be a number"));
        assert!(parse_line("read_parameter").is_err());
        assert!(parse_line("read_parameter 70000").is_err());
        assert!(parse_line("read_pin -1").is_err());
    }

    #[test]
    fn test_format_status() {
        let mut status = BTreeMap::new();
        status.insert(StatusKey::Busy, StatusValue::Int(0));
        status.insert(StatusKey::Last, StatusValue::Text("emergency_stop".to_string()));
        let text = format_status(&status);
        assert!(text.contains("busy: 0"));
        assert!(text.contains("last: emergency_stop"));
    }
}
