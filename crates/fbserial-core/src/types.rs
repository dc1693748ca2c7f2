//! Domain value types
//!
//! Small validated types shared by the command surface and the status
//! store: axes, pin modes, end stops, positions and boolean coercion.

use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Machine axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// All axes in wire order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Pick the value belonging to this axis
    ///
    /// The controller numbers per-axis parameters consecutively
    /// (e.g. 71/72/73 for max speed), callers pass the triple.
    pub fn select<T>(self, x: T, y: T, z: T) -> T {
        match self {
            Axis::X => x,
            Axis::Y => y,
            Axis::Z => z,
        }
    }

    /// Upper-case wire letter
    pub fn letter(self) -> char {
        self.select('X', 'Y', 'Z')
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.select("x", "y", "z"))
    }
}

impl FromStr for Axis {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(CommandError::InvalidAxis {
                axis: s.to_string(),
            }),
        }
    }
}

/// Pin read/write mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Digital I/O (wire value 0)
    #[default]
    Digital,
    /// Analog I/O (wire value 1)
    Analog,
}

impl PinMode {
    /// Numeric mode sent in the `M` field
    pub fn wire_value(self) -> i64 {
        match self {
            PinMode::Digital => 0,
            PinMode::Analog => 1,
        }
    }

    /// Resolve a numeric `M` field value
    pub fn from_wire(value: i64) -> Result<Self, CommandError> {
        match value {
            0 => Ok(PinMode::Digital),
            1 => Ok(PinMode::Analog),
            other => Err(CommandError::InvalidPinMode {
                mode: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinMode::Digital => write!(f, "digital"),
            PinMode::Analog => write!(f, "analog"),
        }
    }
}

impl FromStr for PinMode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digital" | "0" => Ok(PinMode::Digital),
            "analog" | "1" => Ok(PinMode::Analog),
            _ => Err(CommandError::InvalidPinMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// One end-stop switch: an axis and its A (min) or B (max) side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndStop {
    /// Axis the switch belongs to
    pub axis: Axis,
    /// `true` for the B side
    pub max_side: bool,
}

impl EndStop {
    /// Parse a report field such as `XA` or `ZB`
    pub fn from_field(field: &str) -> Option<Self> {
        let mut chars = field.chars();
        let axis = match chars.next()? {
            'X' => Axis::X,
            'Y' => Axis::Y,
            'Z' => Axis::Z,
            _ => return None,
        };
        let max_side = match chars.next()? {
            'A' => false,
            'B' => true,
            _ => return None,
        };
        if chars.next().is_some() {
            return None;
        }
        Some(Self { axis, max_side })
    }
}

impl fmt::Display for EndStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.max_side { "b" } else { "a" };
        write!(f, "end_stop_{}_{}", self.axis, side)
    }
}

/// Integer step coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X in steps
    pub x: i64,
    /// Y in steps
    pub y: i64,
    /// Z in steps
    pub z: i64,
}

impl Position {
    /// Create a position
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Add an offset and clamp every axis at zero; sums saturate
    pub fn offset_clamped(self, delta: Position) -> Position {
        Position {
            x: self.x.saturating_add(delta.x).max(0),
            y: self.y.saturating_add(delta.y).max(0),
            z: self.z.saturating_add(delta.z).max(0),
        }
    }

    /// Clamp every axis at zero
    pub fn clamped(self) -> Position {
        self.offset_clamped(Position::default())
    }
}

/// Values accepted where the device expects a boolean flag
///
/// Only `true`, `false`, `1`, `0`, `"true"`, `"false"`, `"1"` and `"0"`
/// are accepted; anything else yields [`CommandError::InvalidBooleanValue`].
pub trait DeviceBool {
    /// Coerce into a boolean
    fn to_device_bool(&self) -> Result<bool, CommandError>;

    /// Coerce into the 0/1 wire value
    fn to_device_flag(&self) -> Result<i64, CommandError> {
        self.to_device_bool().map(i64::from)
    }
}

impl DeviceBool for bool {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        Ok(*self)
    }
}

impl DeviceBool for i64 {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        match self {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(CommandError::InvalidBooleanValue {
                value: other.to_string(),
            }),
        }
    }
}

impl DeviceBool for i32 {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        i64::from(*self).to_device_bool()
    }
}

impl DeviceBool for str {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        match self {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(CommandError::InvalidBooleanValue {
                value: other.to_string(),
            }),
        }
    }
}

impl DeviceBool for &str {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        (**self).to_device_bool()
    }
}

impl DeviceBool for String {
    fn to_device_bool(&self) -> Result<bool, CommandError> {
        self.as_str().to_device_bool()
    }
}
