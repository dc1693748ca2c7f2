//! Parameter reconciliation
//!
//! Keeps the device-resident settings equal to the persisted ones. The
//! device stores a version counter at parameter 0; when it matches the
//! persisted version nothing else is read. Otherwise every parameter is
//! read back, the ones that differ are rewritten, and the persisted
//! version is stamped onto the device once nothing differs any more.

use fbserial_core::{ParameterError, Result};
use fbserial_settings::{CatalogEntry, ParameterStore, SettingsError, VERSION_PARAMETER_ID};

/// Synchronous parameter round-trips with the device
pub trait ParameterChannel {
    /// Read one parameter (`F21 P<id>` answered by `R21 P<id> V<value>`)
    fn read_parameter(&mut self, id: u16) -> Result<i64>;

    /// Write one parameter (`F22 P<id> V<value>` answered by `R02`)
    fn write_parameter(&mut self, id: u16, value: i64) -> Result<()>;
}

/// One reconciled setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Setting name from the catalog
    pub name: String,
    /// Device id
    pub id: u16,
    /// Persisted value
    pub value_db: i64,
    /// Last value read from or written to the device
    pub value_ar: Option<i64>,
    /// Catalog default, used when nothing is persisted
    pub default: i64,
}

impl ParameterDescriptor {
    fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            id: entry.id,
            value_db: entry.default,
            value_ar: None,
            default: entry.default,
        }
    }

    /// Whether the device is known to hold the persisted value
    pub fn in_sync(&self) -> bool {
        self.value_ar == Some(self.value_db)
    }
}

/// Result of one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Device version matched the persisted version; nothing else was read
    AlreadyInSync {
        /// The shared version
        version: i64,
    },
    /// All parameters match and the version was stamped
    Converged {
        /// Names of the parameters that were rewritten
        pushed: Vec<String>,
        /// The stamped version
        version: i64,
    },
    /// Some parameters still differ; the version was not stamped
    Diverged {
        /// Names of the parameters that still differ
        remaining: Vec<String>,
    },
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInSync { version } => {
                write!(f, "parameters already in sync (version {})", version)
            }
            Self::Converged { pushed, version } if pushed.is_empty() => {
                write!(f, "parameters in sync, stamped version {}", version)
            }
            Self::Converged { pushed, version } => write!(
                f,
                "pushed {} and stamped version {}",
                pushed.join(", "),
                version
            ),
            Self::Diverged { remaining } => {
                write!(f, "parameters still differ: {}", remaining.join(", "))
            }
        }
    }
}

/// Versioned reconciler over a parameter store
pub struct ParameterReconciler<S: ParameterStore> {
    store: S,
    descriptors: Vec<ParameterDescriptor>,
    version_db: i64,
    version_ar: Option<i64>,
    in_sync: bool,
}

fn persistence(err: SettingsError) -> ParameterError {
    ParameterError::Persistence {
        reason: err.to_string(),
    }
}

impl<S: ParameterStore> ParameterReconciler<S> {
    /// Build descriptors from the store's catalog and load persisted values
    pub fn new(store: S) -> Result<Self> {
        let catalog = store.load_catalog().map_err(persistence)?;
        let mut reconciler = Self {
            store,
            descriptors: catalog.iter().map(ParameterDescriptor::from_entry).collect(),
            version_db: 0,
            version_ar: None,
            in_sync: false,
        };
        reconciler.load_values()?;
        Ok(reconciler)
    }

    /// Descriptors in catalog order
    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    /// Descriptor by name (case-insensitive)
    pub fn by_name(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Descriptor by device id
    pub fn by_id(&self, id: u16) -> Option<&ParameterDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Persisted version
    pub fn version_db(&self) -> i64 {
        self.version_db
    }

    /// Version last read from the device
    pub fn version_ar(&self) -> Option<i64> {
        self.version_ar
    }

    /// Whether the last call ended in sync
    pub fn in_sync(&self) -> bool {
        self.in_sync
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_values(&mut self) -> Result<()> {
        for descriptor in &mut self.descriptors {
            descriptor.value_db = self
                .store
                .persisted_value(descriptor.id)
                .map_err(persistence)?
                .unwrap_or(descriptor.default);
        }
        self.version_db = self
            .store
            .persisted_value(VERSION_PARAMETER_ID)
            .map_err(persistence)?
            .unwrap_or(0);
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.store.reload().map_err(persistence)?;
        self.load_values()
    }

    fn record_device_value(&mut self, id: u16, value: i64) {
        if let Some(descriptor) = self.descriptors.iter_mut().find(|d| d.id == id) {
            descriptor.value_ar = Some(value);
        }
    }

    /// Bring the device parameters in line with the persisted ones
    pub fn check_parameters<P: ParameterChannel>(
        &mut self,
        channel: &mut P,
    ) -> Result<ReconcileOutcome> {
        // Persisted values may have changed since the last call.
        self.reload()?;
        let version_ar = channel.read_parameter(VERSION_PARAMETER_ID)?;
        self.version_ar = Some(version_ar);
        self.record_device_value(VERSION_PARAMETER_ID, version_ar);

        if version_ar == self.version_db {
            self.in_sync = true;
            tracing::info!("Parameters in sync at version {}", version_ar);
            return Ok(ReconcileOutcome::AlreadyInSync {
                version: version_ar,
            });
        }

        tracing::info!(
            "Parameter version differs (device {}, persisted {}), comparing parameters",
            version_ar,
            self.version_db
        );
        self.in_sync = false;

        let mut pushed = Vec::new();
        for index in 0..self.descriptors.len() {
            let (id, value_db) = {
                let descriptor = &self.descriptors[index];
                (descriptor.id, descriptor.value_db)
            };
            if id == VERSION_PARAMETER_ID {
                continue;
            }

            let device_value = channel.read_parameter(id)?;
            self.descriptors[index].value_ar = Some(device_value);
            if device_value == value_db {
                continue;
            }

            let name = self.descriptors[index].name.clone();
            tracing::info!("Writing {} = {} (device had {})", name, value_db, device_value);
            match channel.write_parameter(id, value_db) {
                Ok(()) => {
                    self.descriptors[index].value_ar = Some(value_db);
                    pushed.push(name);
                }
                Err(e) if e.is_closed() => return Err(e),
                Err(e) => tracing::warn!("Writing {} failed: {}", name, e),
            }
        }

        let remaining: Vec<String> = self
            .descriptors
            .iter()
            .filter(|d| d.id != VERSION_PARAMETER_ID && !d.in_sync())
            .map(|d| d.name.clone())
            .collect();

        if !remaining.is_empty() {
            tracing::warn!("{} parameters still differ: {}", remaining.len(), remaining.join(", "));
            return Ok(ReconcileOutcome::Diverged { remaining });
        }

        channel.write_parameter(VERSION_PARAMETER_ID, self.version_db)?;
        self.version_ar = Some(self.version_db);
        self.record_device_value(VERSION_PARAMETER_ID, self.version_db);
        self.in_sync = true;
        tracing::info!(
            "Parameters converged at version {} ({} written)",
            self.version_db,
            pushed.len()
        );
        Ok(ReconcileOutcome::Converged {
            pushed,
            version: self.version_db,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbserial_core::ConnectionError;
    use fbserial_settings::{MemoryParameterStore, ParameterCatalog};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Read(u16),
        Write(u16, i64),
    }

    #[derive(Default)]
    struct FakeChannel {
        values: HashMap<u16, i64>,
        calls: Vec<Call>,
        failing_writes: Vec<u16>,
    }

    impl ParameterChannel for FakeChannel {
        fn read_parameter(&mut self, id: u16) -> Result<i64> {
            self.calls.push(Call::Read(id));
            Ok(self.values.get(&id).copied().unwrap_or(0))
        }

        fn write_parameter(&mut self, id: u16, value: i64) -> Result<()> {
            self.calls.push(Call::Write(id, value));
            if self.failing_writes.contains(&id) {
                return Err(ConnectionError::Timeout {
                    waiting_for: "R02".to_string(),
                    timeout_ms: 10,
                }
                .into());
            }
            self.values.insert(id, value);
            Ok(())
        }
    }

    fn small_store(version: i64, speed: i64) -> MemoryParameterStore {
        let mut store = MemoryParameterStore::with_catalog(ParameterCatalog::new(vec![
            CatalogEntry::new("PARAM_VERSION", 0, 0),
            CatalogEntry::new("MOVEMENT_MAX_SPD_X", 71, 800),
            CatalogEntry::new("MOVEMENT_MAX_SPD_Y", 72, 800),
        ]));
        store.set_value(0, version);
        store.set_value(71, speed);
        store
    }

    #[test]
    fn test_descriptors_fall_back_to_defaults() {
        let reconciler = ParameterReconciler::new(small_store(5, 900)).unwrap();
        assert_eq!(reconciler.version_db(), 5);
        assert_eq!(reconciler.by_id(71).unwrap().value_db, 900);
        assert_eq!(reconciler.by_name("movement_max_spd_y").unwrap().value_db, 800);
        assert_eq!(reconciler.by_id(72).unwrap().value_ar, None);
    }

    #[test]
    fn test_matching_version_reads_only_version() {
        let mut reconciler = ParameterReconciler::new(small_store(5, 900)).unwrap();
        let mut channel = FakeChannel::default();
        channel.values.insert(0, 5);

        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyInSync { version: 5 });
        assert_eq!(channel.calls, vec![Call::Read(0)]);
        assert!(reconciler.in_sync());
    }

    #[test]
    fn test_stale_version_pushes_differences_then_stamps() {
        let mut reconciler = ParameterReconciler::new(small_store(5, 900)).unwrap();
        let mut channel = FakeChannel::default();
        channel.values.insert(0, 4);
        channel.values.insert(71, 800);
        channel.values.insert(72, 800);

        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Converged {
                pushed: vec!["MOVEMENT_MAX_SPD_X".to_string()],
                version: 5,
            }
        );
        assert_eq!(
            channel.calls,
            vec![
                Call::Read(0),
                Call::Read(71),
                Call::Write(71, 900),
                Call::Read(72),
                Call::Write(0, 5),
            ]
        );
        assert_eq!(reconciler.version_ar(), Some(5));

        channel.calls.clear();
        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyInSync { version: 5 });
        assert_eq!(channel.calls, vec![Call::Read(0)]);
    }

    #[test]
    fn test_failed_write_withholds_version() {
        let mut reconciler = ParameterReconciler::new(small_store(5, 900)).unwrap();
        let mut channel = FakeChannel {
            failing_writes: vec![71],
            ..FakeChannel::default()
        };
        channel.values.insert(0, 4);
        channel.values.insert(72, 800);

        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Diverged {
                remaining: vec!["MOVEMENT_MAX_SPD_X".to_string()]
            }
        );
        assert!(!channel.calls.contains(&Call::Write(0, 5)));
        assert!(!reconciler.in_sync());

        channel.failing_writes.clear();
        channel.calls.clear();
        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Converged { .. }));
        assert_eq!(channel.calls.last(), Some(&Call::Write(0, 5)));
    }

    #[test]
    fn test_read_failure_aborts() {
        struct DeadChannel;
        impl ParameterChannel for DeadChannel {
            fn read_parameter(&mut self, _id: u16) -> Result<i64> {
                Err(ConnectionError::Closed.into())
            }
            fn write_parameter(&mut self, _id: u16, _value: i64) -> Result<()> {
                Err(ConnectionError::Closed.into())
            }
        }

        let mut reconciler = ParameterReconciler::new(small_store(5, 900)).unwrap();
        let err = reconciler.check_parameters(&mut DeadChannel).unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn test_outcome_display() {
        let converged = ReconcileOutcome::Converged {
            pushed: vec!["MOVEMENT_MAX_SPD_X".to_string()],
            version: 5,
        };
        assert_eq!(
            converged.to_string(),
            "pushed MOVEMENT_MAX_SPD_X and stamped version 5"
        );
        assert_eq!(
            ReconcileOutcome::AlreadyInSync { version: 5 }.to_string(),
            "parameters already in sync (version 5)"
        );
    }

    /// Store whose backing values can change underneath the reconciler
    struct EditableStore {
        catalog: ParameterCatalog,
        backing: std::sync::Arc<std::sync::Mutex<HashMap<u16, i64>>>,
        loaded: HashMap<u16, i64>,
    }

    impl ParameterStore for EditableStore {
        fn load_catalog(&self) -> fbserial_settings::SettingsResult<ParameterCatalog> {
            Ok(self.catalog.clone())
        }

        fn persisted_value(&self, id: u16) -> fbserial_settings::SettingsResult<Option<i64>> {
            Ok(self.loaded.get(&id).copied())
        }

        fn reload(&mut self) -> fbserial_settings::SettingsResult<()> {
            self.loaded = self.backing.lock().unwrap().clone();
            Ok(())
        }
    }

    #[test]
    fn test_persisted_changes_are_seen_between_calls() {
        let backing = std::sync::Arc::new(std::sync::Mutex::new(HashMap::from([
            (0, 5),
            (71, 900),
        ])));
        let store = EditableStore {
            catalog: small_store(0, 0).load_catalog().unwrap(),
            backing: backing.clone(),
            loaded: backing.lock().unwrap().clone(),
        };
        let mut reconciler = ParameterReconciler::new(store).unwrap();
        let mut channel = FakeChannel::default();
        channel.values.extend([(0, 5), (71, 900), (72, 800)]);

        let outcome = reconciler.check_parameters(&mut channel).unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyInSync { version: 5 });

        backing.lock().unwrap().extend([(0, 6), (71, 1000)]);
        channel.calls.clear();
        let outcome = reconciler.check_parameters(&mut channel).unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Converged {
                pushed: vec!["MOVEMENT_MAX_SPD_X".to_string()],
                version: 6,
            }
        );
        assert_eq!(channel.values.get(&71), Some(&1000));
        assert_eq!(channel.calls.last(), Some(&Call::Write(0, 6)));
        assert_eq!(reconciler.version_db(), 6);
    }
}
