//! # fbserial
//!
//! Host-side driver for FarmBot-style motion controllers that speak a
//! G-code dialect over a serial link.
//!
//! ## Architecture
//!
//! fbserial is organized as a workspace with multiple crates:
//!
//! 1. **fbserial-core** - G-code codec, status store, errors, events
//! 2. **fbserial-settings** - Configuration and persisted device parameters
//! 3. **fbserial-communication** - Serial transport, outbound queue, dispatcher,
//!    parameter reconciliation and the async engine
//! 4. **fbserial** - Interactive console binary that integrates all crates

pub mod console;

pub use fbserial_communication::{
    list_ports, spawn, Device, DeviceCommand, DeviceHandle, LineTransport, ParameterReconciler,
    RealSerialPort, ReconcileOutcome, SerialPortInfo,
};
pub use fbserial_core::{
    Command, DeviceEvent, Error, GcodeMessage, Result, StatusDiff, StatusKey, StatusValue,
};
pub use fbserial_settings::{
    Config, ConnectionSettings, EngineSettings, JsonParameterStore, MemoryParameterStore,
    ParameterStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Pretty console output on stderr
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the console
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
