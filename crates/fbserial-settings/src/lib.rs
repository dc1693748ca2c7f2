//! fbserial Settings Crate
//!
//! Handles runtime configuration and the persisted device parameters that
//! the reconciliation protocol pushes to the controller.

pub mod config;
pub mod error;
pub mod parameters;

pub use config::{
    Config, ConnectionSettings, EngineSettings, FlowControl, ParameterSettings, Parity,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
pub use parameters::{
    CatalogEntry, JsonParameterStore, MemoryParameterStore, ParameterCatalog, ParameterStore,
    DEFAULT_CATALOG, VERSION_PARAMETER_ID,
};
