//! Device engine for the FarmBot arduino firmware
//!
//! [`Device`] owns the transport, the status store and the outbound queue
//! and is the single writer to the serial link. [`spawn`] hosts it on a
//! tokio task and hands out a cloneable [`DeviceHandle`].

pub mod commands;
pub mod device;
pub mod dispatcher;
pub mod parameters;
pub mod runner;

pub use commands::DeviceCommand;
pub use device::Device;
pub use dispatcher::dispatch;
pub use parameters::{ParameterChannel, ParameterDescriptor, ParameterReconciler, ReconcileOutcome};
pub use runner::{spawn, DeviceHandle};
