//! G-code codec
//!
//! Encodes outgoing commands into protocol lines (`G00 X10 Y20 Z0`,
//! `F21 P8`) and decodes incoming `R`-prefixed lines into named
//! messages. Encoding and decoding are pure and never block.

mod command;
mod dictionary;
mod message;

pub use command::{Command, Opcode};
pub use dictionary::{parameter_name, PARAMETER_DICTIONARY};
pub use message::{GcodeMessage, MessageKind};
