//! # fbserial Communication
//!
//! Serial transport and the device synchronization engine for fbserial.
//! Includes the outbound command queue with its readiness gate, the
//! incoming message dispatcher, parameter reconciliation and the async
//! runner that hosts the engine.

pub mod clock;
pub mod communication;
pub mod firmware;

pub use clock::{Clock, ManualClock, SystemClock};
pub use communication::{
    serial::{list_ports, LineTransport, RealSerialPort, SerialPort, SerialPortInfo},
    FlushOutcome, OutboundQueue, Transport, TransportEvent,
};
pub use firmware::{
    dispatch, spawn, Device, DeviceCommand, DeviceHandle, ParameterChannel, ParameterDescriptor,
    ParameterReconciler, ReconcileOutcome,
};
