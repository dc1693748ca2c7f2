//! Command surface
//!
//! Every operation validates its input before touching the queue, so a
//! rejected call leaves the queue, the store and the transport untouched.
//! Per-axis settings map onto consecutive parameter ids (x, y, z).

use crate::clock::Clock;
use crate::communication::Transport;
use crate::firmware::device::Device;
use fbserial_core::{
    parameter_name, Axis, Command, CommandError, DeviceBool, Opcode, PinMode, Position, Result,
    StatusKey,
};

/// A request for the engine, as submitted through a device handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Move by an offset from the last reported position
    MoveRelative {
        x: i64,
        y: i64,
        z: i64,
        speed: Option<i64>,
    },
    /// Move to absolute coordinates
    MoveAbsolute {
        x: i64,
        y: i64,
        z: i64,
        speed: Option<i64>,
    },
    /// Move to raw step targets
    MoveSteps { x: i64, y: i64, z: i64 },
    /// Home one axis (`x`, `y`, `z`) or `all`
    Home { axis: String },
    /// Calibrate one axis
    Calibrate { axis: String },
    /// Read a device parameter
    ReadParameter { id: u16 },
    /// Write a device parameter
    WriteParameter { id: u16, value: i64 },
    /// Read a pin
    ReadPin { pin: u32, mode: String },
    /// Write a pin
    WritePin { pin: u32, value: i64, mode: String },
    /// Configure a pin
    SetPinMode { pin: u32, mode: String },
    /// Pulse a pin between two values
    PulsePin {
        pin: u32,
        value1: i64,
        value2: i64,
        time: i64,
        mode: String,
    },
    /// Move a servo
    ServoMove { pin: u32, value: i64 },
    /// Dose an amount of water
    DoseWater { amount: i64 },
    /// Ask for the end-stop states
    ReadEndStops,
    /// Ask for the current position
    ReadPosition,
    /// Ask for the firmware version
    ReadVersion,
    /// Read a status register
    ReadStatus { id: u16 },
    /// Set the maximum speed of an axis
    SetMaxSpeed { axis: String, value: i64 },
    /// Set the acceleration distance of an axis
    SetAcceleration { axis: String, value: i64 },
    /// Set the movement timeout of an axis
    SetTimeout { axis: String, value: i64 },
    /// Invert the end stops of an axis
    SetEndInversion { axis: String, value: String },
    /// Invert the motor of an axis
    SetMotorInversion { axis: String, value: String },
    /// Not stored on the device; always rejected
    SetStepsPerMm { axis: String, value: i64 },
    /// Not stored on the device; always rejected
    SetNegativeCoordinates { axis: String, value: String },
    /// Drop the queue and stop immediately
    EmergencyStop,
}

impl DeviceCommand {
    /// Snake-case operation name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveRelative { .. } => "move_relative",
            Self::MoveAbsolute { .. } => "move_absolute",
            Self::MoveSteps { .. } => "move_steps",
            Self::Home { .. } => "home",
            Self::Calibrate { .. } => "calibrate",
            Self::ReadParameter { .. } => "read_parameter",
            Self::WriteParameter { .. } => "write_parameter",
            Self::ReadPin { .. } => "read_pin",
            Self::WritePin { .. } => "write_pin",
            Self::SetPinMode { .. } => "set_pin_mode",
            Self::PulsePin { .. } => "pulse_pin",
            Self::ServoMove { .. } => "servo_move",
            Self::DoseWater { .. } => "dose_water",
            Self::ReadEndStops => "read_end_stops",
            Self::ReadPosition => "read_position",
            Self::ReadVersion => "read_version",
            Self::ReadStatus { .. } => "read_status",
            Self::SetMaxSpeed { .. } => "set_max_speed",
            Self::SetAcceleration { .. } => "set_acceleration",
            Self::SetTimeout { .. } => "set_timeout",
            Self::SetEndInversion { .. } => "set_end_inversion",
            Self::SetMotorInversion { .. } => "set_motor_inversion",
            Self::SetStepsPerMm { .. } => "set_steps_per_mm",
            Self::SetNegativeCoordinates { .. } => "set_negative_coordinates",
            Self::EmergencyStop => "emergency_stop",
        }
    }
}

fn unsupported(command: &str) -> CommandError {
    CommandError::InvalidArgument {
        command: command.to_string(),
        reason: "not stored on the device; unsupported".to_string(),
    }
}

impl<T: Transport, C: Clock> Device<T, C> {
    /// Run one request
    pub fn apply(&mut self, command: DeviceCommand) -> Result<()> {
        match command {
            DeviceCommand::MoveRelative { x, y, z, speed } => self.move_relative(x, y, z, speed),
            DeviceCommand::MoveAbsolute { x, y, z, speed } => self.move_absolute(x, y, z, speed),
            DeviceCommand::MoveSteps { x, y, z } => self.move_steps(x, y, z),
            DeviceCommand::Home { axis } => self.home(&axis),
            DeviceCommand::Calibrate { axis } => self.calibrate(&axis),
            DeviceCommand::ReadParameter { id } => self.read_parameter(id),
            DeviceCommand::WriteParameter { id, value } => self.write_parameter(id, value),
            DeviceCommand::ReadPin { pin, mode } => self.read_pin(pin, &mode),
            DeviceCommand::WritePin { pin, value, mode } => self.write_pin(pin, value, &mode),
            DeviceCommand::SetPinMode { pin, mode } => self.set_pin_mode(pin, &mode),
            DeviceCommand::PulsePin {
                pin,
                value1,
                value2,
                time,
                mode,
            } => self.pulse_pin(pin, value1, value2, time, &mode),
            DeviceCommand::ServoMove { pin, value } => self.servo_move(pin, value),
            DeviceCommand::DoseWater { amount } => self.dose_water(amount),
            DeviceCommand::ReadEndStops => self.read_end_stops(),
            DeviceCommand::ReadPosition => self.read_position(),
            DeviceCommand::ReadVersion => self.read_version(),
            DeviceCommand::ReadStatus { id } => self.read_status(id),
            DeviceCommand::SetMaxSpeed { axis, value } => self.set_max_speed(&axis, value),
            DeviceCommand::SetAcceleration { axis, value } => self.set_acceleration(&axis, value),
            DeviceCommand::SetTimeout { axis, value } => self.set_timeout(&axis, value),
            DeviceCommand::SetEndInversion { axis, value } => {
                self.set_end_inversion(&axis, value.as_str())
            }
            DeviceCommand::SetMotorInversion { axis, value } => {
                self.set_motor_inversion(&axis, value.as_str())
            }
            DeviceCommand::SetStepsPerMm { axis, value } => self.set_steps_per_mm(&axis, value),
            DeviceCommand::SetNegativeCoordinates { axis, value } => {
                self.set_negative_coordinates(&axis, value.as_str())
            }
            DeviceCommand::EmergencyStop => self.emergency_stop(),
        }
    }

    /// `G00` to the last reported position plus an offset, clamped at zero
    pub fn move_relative(&mut self, x: i64, y: i64, z: i64, speed: Option<i64>) -> Result<()> {
        let target = self
            .status()
            .current_position()
            .offset_clamped(Position::new(x, y, z));
        self.enqueue(Command::move_to(target, speed));
        Ok(())
    }

    /// `G00` to absolute coordinates, clamped at zero
    pub fn move_absolute(&mut self, x: i64, y: i64, z: i64, speed: Option<i64>) -> Result<()> {
        self.enqueue(Command::move_to(Position::new(x, y, z), speed));
        Ok(())
    }

    /// `G01` to raw step targets
    pub fn move_steps(&mut self, x: i64, y: i64, z: i64) -> Result<()> {
        self.enqueue(Command::move_steps(Position::new(x, y, z)));
        Ok(())
    }

    /// Home `x`, `y`, `z` or `all`
    pub fn home(&mut self, axis: &str) -> Result<()> {
        if axis.trim().eq_ignore_ascii_case("all") {
            return self.home_all();
        }
        let axis: Axis = axis.parse()?;
        self.enqueue(Command::new(axis.select(
            Opcode::HomeX,
            Opcode::HomeY,
            Opcode::HomeZ,
        )));
        Ok(())
    }

    /// `F11`
    pub fn home_x(&mut self) -> Result<()> {
        self.home("x")
    }

    /// `F12`
    pub fn home_y(&mut self) -> Result<()> {
        self.home("y")
    }

    /// `F13`
    pub fn home_z(&mut self) -> Result<()> {
        self.home("z")
    }

    /// `G28`
    pub fn home_all(&mut self) -> Result<()> {
        self.enqueue(Command::new(Opcode::HomeAll));
        Ok(())
    }

    /// `F14`/`F15`/`F16`
    pub fn calibrate(&mut self, axis: &str) -> Result<()> {
        let axis: Axis = axis.parse()?;
        self.enqueue(Command::new(axis.select(
            Opcode::CalibrateX,
            Opcode::CalibrateY,
            Opcode::CalibrateZ,
        )));
        Ok(())
    }

    /// `F21 P<id>`
    pub fn read_parameter(&mut self, id: u16) -> Result<()> {
        self.enqueue(Command::read_parameter(id));
        Ok(())
    }

    /// `F22 P<id> V<value>`, recording the value under the parameter's name
    pub fn write_parameter(&mut self, id: u16, value: i64) -> Result<()> {
        self.enqueue(Command::write_parameter(id, value));
        self.status_mut().transaction(|tx| {
            tx.set(StatusKey::Parameter(parameter_name(id)), value);
        });
        Ok(())
    }

    /// `F42 P<pin> M<mode>`
    pub fn read_pin(&mut self, pin: u32, mode: &str) -> Result<()> {
        let mode: PinMode = mode.parse()?;
        self.enqueue(Command::read_pin(pin, mode));
        Ok(())
    }

    /// `F41 P<pin> V<value> M<mode>`, recording the pin value
    pub fn write_pin(&mut self, pin: u32, value: i64, mode: &str) -> Result<()> {
        let mode: PinMode = mode.parse()?;
        self.enqueue(Command::write_pin(pin, value, mode));
        self.status_mut().set(StatusKey::Pin(pin), value);
        Ok(())
    }

    /// `F43 P<pin> M<mode>`
    pub fn set_pin_mode(&mut self, pin: u32, mode: &str) -> Result<()> {
        let mode: PinMode = mode.parse()?;
        self.enqueue(
            Command::new(Opcode::SetPinMode)
                .with('P', i64::from(pin))
                .with('M', mode.wire_value()),
        );
        Ok(())
    }

    /// `F44 P<pin> V<value1> W<value2> T<time> M<mode>`
    pub fn pulse_pin(
        &mut self,
        pin: u32,
        value1: i64,
        value2: i64,
        time: i64,
        mode: &str,
    ) -> Result<()> {
        let mode: PinMode = mode.parse()?;
        self.enqueue(
            Command::new(Opcode::PulsePin)
                .with('P', i64::from(pin))
                .with('V', value1)
                .with('W', value2)
                .with('T', time)
                .with('M', mode.wire_value()),
        );
        Ok(())
    }

    /// `F61 P<pin> V<value>`
    pub fn servo_move(&mut self, pin: u32, value: i64) -> Result<()> {
        self.enqueue(
            Command::new(Opcode::ServoMove)
                .with('P', i64::from(pin))
                .with('V', value),
        );
        Ok(())
    }

    /// `F01 Q<amount>`
    pub fn dose_water(&mut self, amount: i64) -> Result<()> {
        self.enqueue(Command::new(Opcode::DoseWater).with('Q', amount));
        Ok(())
    }

    /// `F81`
    pub fn read_end_stops(&mut self) -> Result<()> {
        self.enqueue(Command::new(Opcode::ReadEndStops));
        Ok(())
    }

    /// `F82`
    pub fn read_position(&mut self) -> Result<()> {
        self.enqueue(Command::new(Opcode::ReadPosition));
        Ok(())
    }

    /// `F83`
    pub fn read_version(&mut self) -> Result<()> {
        self.enqueue(Command::new(Opcode::ReadVersion));
        Ok(())
    }

    /// `F31 P<id>`
    pub fn read_status(&mut self, id: u16) -> Result<()> {
        self.enqueue(Command::read_status(id));
        Ok(())
    }

    /// Parameters 71/72/73
    pub fn set_max_speed(&mut self, axis: &str, value: i64) -> Result<()> {
        let axis: Axis = axis.parse()?;
        self.write_parameter(axis.select(71, 72, 73), value)
    }

    /// Parameters 41/42/43
    pub fn set_acceleration(&mut self, axis: &str, value: i64) -> Result<()> {
        let axis: Axis = axis.parse()?;
        self.write_parameter(axis.select(41, 42, 43), value)
    }

    /// Parameters 11/12/13
    pub fn set_timeout(&mut self, axis: &str, value: i64) -> Result<()> {
        let axis: Axis = axis.parse()?;
        self.write_parameter(axis.select(11, 12, 13), value)
    }

    /// Parameters 21/22/23
    pub fn set_end_inversion(&mut self, axis: &str, value: impl DeviceBool) -> Result<()> {
        let axis: Axis = axis.parse()?;
        let flag = value.to_device_flag()?;
        self.write_parameter(axis.select(21, 22, 23), flag)
    }

    /// Parameters 31/32/33
    pub fn set_motor_inversion(&mut self, axis: &str, value: impl DeviceBool) -> Result<()> {
        let axis: Axis = axis.parse()?;
        let flag = value.to_device_flag()?;
        self.write_parameter(axis.select(31, 32, 33), flag)
    }

    /// Steps per millimetre live on the host; rejected without any write
    pub fn set_steps_per_mm(&mut self, axis: &str, _value: i64) -> Result<()> {
        axis.parse::<Axis>()?;
        Err(unsupported("set_steps_per_mm").into())
    }

    /// Negative coordinates live on the host; rejected without any write
    pub fn set_negative_coordinates(&mut self, axis: &str, value: impl DeviceBool) -> Result<()> {
        axis.parse::<Axis>()?;
        value.to_device_bool()?;
        Err(unsupported("set_negative_coordinates").into())
    }
}
