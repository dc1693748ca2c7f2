//! Persisted device parameters
//!
//! The persisted values are the source of truth that reconciliation pushes
//! to the controller. A [`ParameterStore`] exposes the parameter catalog and
//! the persisted value of each id; nothing is written back by the driver
//! during reconciliation.

use crate::error::SettingsResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reserved id holding the parameter version counter
pub const VERSION_PARAMETER_ID: u16 = 0;

/// Built-in catalog: name, device id, default value
pub const DEFAULT_CATALOG: &[(&str, u16, i64)] = &[
    ("PARAM_VERSION", 0, 0),
    ("MOVEMENT_TIMEOUT_X", 11, 120),
    ("MOVEMENT_TIMEOUT_Y", 12, 120),
    ("MOVEMENT_TIMEOUT_Z", 13, 120),
    ("MOVEMENT_INVERT_ENDPOINTS_X", 21, 0),
    ("MOVEMENT_INVERT_ENDPOINTS_Y", 22, 0),
    ("MOVEMENT_INVERT_ENDPOINTS_Z", 23, 0),
    ("MOVEMENT_INVERT_MOTOR_X", 31, 0),
    ("MOVEMENT_INVERT_MOTOR_Y", 32, 0),
    ("MOVEMENT_INVERT_MOTOR_Z", 33, 0),
    ("MOVEMENT_STEPS_ACC_DEC_X", 41, 500),
    ("MOVEMENT_STEPS_ACC_DEC_Y", 42, 500),
    ("MOVEMENT_STEPS_ACC_DEC_Z", 43, 500),
    ("MOVEMENT_HOME_UP_X", 51, 0),
    ("MOVEMENT_HOME_UP_Y", 52, 0),
    ("MOVEMENT_HOME_UP_Z", 53, 0),
    ("MOVEMENT_MIN_SPD_X", 61, 50),
    ("MOVEMENT_MIN_SPD_Y", 62, 50),
    ("MOVEMENT_MIN_SPD_Z", 63, 50),
    ("MOVEMENT_MAX_SPD_X", 71, 800),
    ("MOVEMENT_MAX_SPD_Y", 72, 800),
    ("MOVEMENT_MAX_SPD_Z", 73, 800),
];

/// One configurable device setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Upper-case setting name
    pub name: String,
    /// Stable numeric address on the wire
    pub id: u16,
    /// Value used when nothing is persisted
    pub default: i64,
}

impl CatalogEntry {
    /// Create an entry
    pub fn new(name: impl Into<String>, id: u16, default: i64) -> Self {
        Self {
            name: name.into(),
            id,
            default,
        }
    }
}

/// Fixed set of parameter descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterCatalog {
    entries: Vec<CatalogEntry>,
}

impl ParameterCatalog {
    /// Build a catalog; an entry whose name is already present is ignored
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut kept: Vec<CatalogEntry> = Vec::new();
        for entry in entries {
            if kept.iter().any(|e| e.name == entry.name) {
                tracing::debug!("Ignoring duplicate catalog entry {}", entry.name);
                continue;
            }
            kept.push(entry);
        }
        Self { entries: kept }
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Iterate entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Look up an entry by name (case-insensitive)
    pub fn by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Look up an entry by device id
    pub fn by_id(&self, id: u16) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ParameterCatalog {
    fn default() -> Self {
        Self::new(
            DEFAULT_CATALOG
                .iter()
                .map(|&(name, id, default)| CatalogEntry::new(name, id, default)),
        )
    }
}

/// Read access to persisted parameter values
pub trait ParameterStore {
    /// The descriptor set to reconcile
    fn load_catalog(&self) -> SettingsResult<ParameterCatalog>;

    /// Persisted value of an id, `None` when nothing is stored
    fn persisted_value(&self, id: u16) -> SettingsResult<Option<i64>>;

    /// Re-read persisted values from the backing storage
    fn reload(&mut self) -> SettingsResult<()> {
        Ok(())
    }
}

impl<S: ParameterStore + ?Sized> ParameterStore for Box<S> {
    fn load_catalog(&self) -> SettingsResult<ParameterCatalog> {
        (**self).load_catalog()
    }

    fn persisted_value(&self, id: u16) -> SettingsResult<Option<i64>> {
        (**self).persisted_value(id)
    }

    fn reload(&mut self) -> SettingsResult<()> {
        (**self).reload()
    }
}

/// In-memory parameter store
#[derive(Debug, Clone, Default)]
pub struct MemoryParameterStore {
    catalog: ParameterCatalog,
    values: BTreeMap<u16, i64>,
}

impl MemoryParameterStore {
    /// Empty store over the built-in catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store over a custom catalog
    pub fn with_catalog(catalog: ParameterCatalog) -> Self {
        Self {
            catalog,
            values: BTreeMap::new(),
        }
    }

    /// Persist a value
    pub fn set_value(&mut self, id: u16, value: i64) {
        self.values.insert(id, value);
    }
}

impl ParameterStore for MemoryParameterStore {
    fn load_catalog(&self) -> SettingsResult<ParameterCatalog> {
        Ok(self.catalog.clone())
    }

    fn persisted_value(&self, id: u16) -> SettingsResult<Option<i64>> {
        Ok(self.values.get(&id).copied())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ParameterFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catalog: Option<Vec<CatalogEntry>>,
    #[serde(default)]
    values: BTreeMap<u16, i64>,
}

/// Parameter store backed by a JSON file
///
/// The file holds a `values` object keyed by parameter id and may carry its
/// own `catalog` list; without one the built-in catalog is used.
#[derive(Debug, Clone)]
pub struct JsonParameterStore {
    path: PathBuf,
    catalog: ParameterCatalog,
    values: BTreeMap<u16, i64>,
}

impl JsonParameterStore {
    /// Open a store; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            catalog: ParameterCatalog::default(),
            values: BTreeMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a value in memory; call [`save`](Self::save) to write it out
    pub fn set_value(&mut self, id: u16, value: i64) {
        self.values.insert(id, value);
    }

    /// Write the current values to the backing file
    pub fn save(&self) -> SettingsResult<()> {
        let file = ParameterFile {
            catalog: (self.catalog != ParameterCatalog::default())
                .then(|| self.catalog.entries().to_vec()),
            values: self.values.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl ParameterStore for JsonParameterStore {
    fn load_catalog(&self) -> SettingsResult<ParameterCatalog> {
        Ok(self.catalog.clone())
    }

    fn persisted_value(&self, id: u16) -> SettingsResult<Option<i64>> {
        Ok(self.values.get(&id).copied())
    }

    fn reload(&mut self) -> SettingsResult<()> {
        if !self.path.exists() {
            tracing::warn!(
                "Parameter database {} not found, starting empty",
                self.path.display()
            );
            self.values.clear();
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let file: ParameterFile = serde_json::from_str(&contents)?;
        self.catalog = file
            .catalog
            .map(ParameterCatalog::new)
            .unwrap_or_default();
        self.values = file.values;
        tracing::debug!(
            "Loaded {} persisted parameter values from {}",
            self.values.len(),
            self.path.display()
        );
        Ok(())
    }
}
