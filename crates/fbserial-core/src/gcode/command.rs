//! Outgoing commands
//!
//! A [`Command`] is an opcode plus an ordered list of letter/value fields.
//! It stays structured while queued and is rendered to text only when
//! it is written to the transport.

use crate::types::{PinMode, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outgoing operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `G00` move to coordinates
    Move,
    /// `G01` move to raw step targets
    MoveSteps,
    /// `G28` home all axes
    HomeAll,
    /// `F01` dose water
    DoseWater,
    /// `F11` home X
    HomeX,
    /// `F12` home Y
    HomeY,
    /// `F13` home Z
    HomeZ,
    /// `F14` calibrate X
    CalibrateX,
    /// `F15` calibrate Y
    CalibrateY,
    /// `F16` calibrate Z
    CalibrateZ,
    /// `F21` read parameter
    ReadParameter,
    /// `F22` write parameter
    WriteParameter,
    /// `F31` read status register
    ReadStatus,
    /// `F41` write pin
    WritePin,
    /// `F42` read pin
    ReadPin,
    /// `F43` set pin mode
    SetPinMode,
    /// `F44` pulse pin
    PulsePin,
    /// `F61` move servo
    ServoMove,
    /// `F81` report end stops
    ReadEndStops,
    /// `F82` report position
    ReadPosition,
    /// `F83` report firmware version
    ReadVersion,
    /// `E` emergency stop
    EmergencyStop,
}

impl Opcode {
    /// Wire token for this opcode
    pub fn code(self) -> &'static str {
        match self {
            Self::Move => "G00",
            Self::MoveSteps => "G01",
            Self::HomeAll => "G28",
            Self::DoseWater => "F01",
            Self::HomeX => "F11",
            Self::HomeY => "F12",
            Self::HomeZ => "F13",
            Self::CalibrateX => "F14",
            Self::CalibrateY => "F15",
            Self::CalibrateZ => "F16",
            Self::ReadParameter => "F21",
            Self::WriteParameter => "F22",
            Self::ReadStatus => "F31",
            Self::WritePin => "F41",
            Self::ReadPin => "F42",
            Self::SetPinMode => "F43",
            Self::PulsePin => "F44",
            Self::ServoMove => "F61",
            Self::ReadEndStops => "F81",
            Self::ReadPosition => "F82",
            Self::ReadVersion => "F83",
            Self::EmergencyStop => "E",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A structured outgoing command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    opcode: Opcode,
    fields: Vec<(char, i64)>,
}

impl Command {
    /// Create a command without fields
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn with(mut self, letter: char, value: i64) -> Self {
        self.fields.push((letter, value));
        self
    }

    /// Append a field only when a value is present
    pub fn with_optional(self, letter: char, value: Option<i64>) -> Self {
        match value {
            Some(value) => self.with(letter, value),
            None => self,
        }
    }

    /// The operation code
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Value of the first field with this letter
    pub fn field(&self, letter: char) -> Option<i64> {
        self.fields
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }

    /// Render the protocol line, without the line terminator
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// `G00` to a target; coordinates are clamped at zero
    pub fn move_to(target: Position, speed: Option<i64>) -> Self {
        let target = target.clamped();
        Self::new(Opcode::Move)
            .with('X', target.x)
            .with('Y', target.y)
            .with('Z', target.z)
            .with_optional('S', speed)
    }

    /// `G01` to raw step targets
    pub fn move_steps(steps: Position) -> Self {
        Self::new(Opcode::MoveSteps)
            .with('X', steps.x)
            .with('Y', steps.y)
            .with('Z', steps.z)
    }

    /// `F21 P<id>`
    pub fn read_parameter(id: u16) -> Self {
        Self::new(Opcode::ReadParameter).with('P', i64::from(id))
    }

    /// `F22 P<id> V<value>`
    pub fn write_parameter(id: u16, value: i64) -> Self {
        Self::new(Opcode::WriteParameter)
            .with('P', i64::from(id))
            .with('V', value)
    }

    /// `F31 P<id>`
    pub fn read_status(id: u16) -> Self {
        Self::new(Opcode::ReadStatus).with('P', i64::from(id))
    }

    /// `F41 P<pin> V<value> M<mode>`
    pub fn write_pin(pin: u32, value: i64, mode: PinMode) -> Self {
        Self::new(Opcode::WritePin)
            .with('P', i64::from(pin))
            .with('V', value)
            .with('M', mode.wire_value())
    }

    /// `F42 P<pin> M<mode>`
    pub fn read_pin(pin: u32, mode: PinMode) -> Self {
        Self::new(Opcode::ReadPin)
            .with('P', i64::from(pin))
            .with('M', mode.wire_value())
    }

    /// `E`
    pub fn emergency_stop() -> Self {
        Self::new(Opcode::EmergencyStop)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.code())?;
        for (letter, value) in &self.fields {
            write!(f, " {}{}", letter, value)?;
        }
        Ok(())
    }
}
