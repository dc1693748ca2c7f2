//! # fbserial Core
//!
//! Core types and protocol primitives for fbserial.
//! Provides the G-code codec spoken with the motion controller, the
//! observable status store, the error taxonomy and the event dispatcher
//! used to publish device events to subscribers.

pub mod error;
pub mod event;
pub mod gcode;
pub mod status;
pub mod types;

pub use error::{CommandError, ConnectionError, Error, ParameterError, Result};
pub use event::{DeviceEvent, EventDispatcher};
pub use gcode::{
    parameter_name, Command, GcodeMessage, MessageKind, Opcode, PARAMETER_DICTIONARY,
};
pub use status::{StatusDiff, StatusKey, StatusStore, StatusTransaction, StatusValue};
pub use types::{Axis, DeviceBool, EndStop, PinMode, Position};
