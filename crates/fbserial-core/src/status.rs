//! Observable device status
//!
//! The [`StatusStore`] is a flat key/value view of what the device last
//! reported (busy flag, position, end stops, pins, parameters). Every
//! mutation computes a diff against the values it touched and, when the
//! diff is non-empty, hands it to the registered observer exactly once.

use crate::gcode::{parameter_name, GcodeMessage, MessageKind};
use crate::types::{Axis, EndStop, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key of one status entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusKey {
    /// 1 while the device is executing, 0 when it accepts commands
    Busy,
    /// Last notable host-side action
    Last,
    /// Current position of one axis, in steps
    Position(Axis),
    /// One end-stop switch
    EndStop(EndStop),
    /// Last known value of a pin
    Pin(u32),
    /// Firmware version string
    SoftwareVersion,
    /// Device parameter, by dictionary name
    Parameter(String),
    /// Status register, by id
    StatusRegister(u16),
    /// Any other reported field, by letter
    Field(String),
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "busy"),
            Self::Last => write!(f, "last"),
            Self::Position(axis) => write!(f, "{}", axis),
            Self::EndStop(stop) => write!(f, "{}", stop),
            Self::Pin(pin) => write!(f, "pin_{}", pin),
            Self::SoftwareVersion => write!(f, "software_version"),
            Self::Parameter(name) => write!(f, "{}", name),
            Self::StatusRegister(id) => write!(f, "status_{}", id),
            Self::Field(letter) => write!(f, "{}", letter.to_ascii_lowercase()),
        }
    }
}

/// Value of one status entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    /// Integer value
    Int(i64),
    /// Boolean flag
    Bool(bool),
    /// Text value
    Text(String),
}

impl StatusValue {
    /// Integer view of the value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Bool(flag) => Some(i64::from(*flag)),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Bool(flag) => write!(f, "{}", flag),
            Self::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<i64> for StatusValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Keys whose value changed during one mutation, with their new values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDiff(BTreeMap<StatusKey, StatusValue>);

impl StatusDiff {
    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// New value of a changed key
    pub fn get(&self, key: &StatusKey) -> Option<&StatusValue> {
        self.0.get(key)
    }

    /// Iterate changed keys in key order
    pub fn iter(&self) -> impl Iterator<Item = (&StatusKey, &StatusValue)> {
        self.0.iter()
    }
}

impl fmt::Display for StatusDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Change observer callback
pub type StatusObserver = Box<dyn FnMut(&StatusDiff) + Send>;

/// Mutable view handed to [`StatusStore::transaction`]
pub struct StatusTransaction<'a> {
    values: &'a mut BTreeMap<StatusKey, StatusValue>,
    before: BTreeMap<StatusKey, Option<StatusValue>>,
}

impl StatusTransaction<'_> {
    /// Set a key inside the transaction
    pub fn set(&mut self, key: StatusKey, value: impl Into<StatusValue>) {
        let previous = self.values.insert(key.clone(), value.into());
        self.before.entry(key).or_insert(previous);
    }

    /// Read a key, including values set earlier in this transaction
    pub fn get(&self, key: &StatusKey) -> Option<&StatusValue> {
        self.values.get(key)
    }

    fn into_diff(self) -> StatusDiff {
        let values = self.values;
        let diff = self
            .before
            .into_iter()
            .filter_map(|(key, before)| {
                let now = values.get(&key)?;
                (before.as_ref() != Some(now)).then(|| (key, now.clone()))
            })
            .collect();
        StatusDiff(diff)
    }
}

/// Observable mapping of device state keys to values
pub struct StatusStore {
    values: BTreeMap<StatusKey, StatusValue>,
    observer: Option<StatusObserver>,
}

impl StatusStore {
    /// Create a store; the device counts as busy until it reports otherwise
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        values.insert(StatusKey::Busy, StatusValue::Int(1));
        Self {
            values,
            observer: None,
        }
    }

    /// Register the change observer, replacing any previous one
    pub fn on_change<F>(&mut self, observer: F)
    where
        F: FnMut(&StatusDiff) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Read a key
    pub fn get(&self, key: &StatusKey) -> Option<&StatusValue> {
        self.values.get(key)
    }

    /// Read a key as an integer
    pub fn get_int(&self, key: &StatusKey) -> Option<i64> {
        self.get(key).and_then(StatusValue::as_int)
    }

    /// Set one key
    pub fn set(&mut self, key: StatusKey, value: impl Into<StatusValue>) -> StatusDiff {
        self.transaction(|tx| tx.set(key, value))
    }

    /// Apply several sets as one mutation with one combined diff
    pub fn transaction<F>(&mut self, f: F) -> StatusDiff
    where
        F: FnOnce(&mut StatusTransaction<'_>),
    {
        let mut tx = StatusTransaction {
            values: &mut self.values,
            before: BTreeMap::new(),
        };
        f(&mut tx);
        let diff = tx.into_diff();
        self.notify(&diff);
        diff
    }

    /// Bulk-update keys from a decoded report
    pub fn merge_report(&mut self, message: &GcodeMessage) -> StatusDiff {
        self.transaction(|tx| {
            let addressed = message
                .field("P")
                .and_then(|p| u16::try_from(p).ok())
                .zip(message.field("V"));

            if let Some((id, value)) = addressed {
                let key = match (message.kind, message.head.as_str()) {
                    (MessageKind::ReportPinValue, _) => StatusKey::Pin(u32::from(id)),
                    (_, "R31") => StatusKey::StatusRegister(id),
                    _ => StatusKey::Parameter(parameter_name(id)),
                };
                tx.set(key, value);
            }

            for (field, value) in &message.fields {
                if addressed.is_some() && (field == "P" || field == "V") {
                    continue;
                }
                match field.as_str() {
                    "X" => tx.set(StatusKey::Position(Axis::X), *value),
                    "Y" => tx.set(StatusKey::Position(Axis::Y), *value),
                    "Z" => tx.set(StatusKey::Position(Axis::Z), *value),
                    other => match EndStop::from_field(other) {
                        Some(stop) => tx.set(StatusKey::EndStop(stop), *value == 1),
                        None => tx.set(StatusKey::Field(other.to_string()), *value),
                    },
                }
            }
        })
    }

    /// Whether the device accepts a new command (`busy == 0`)
    pub fn is_ready(&self) -> bool {
        self.get_int(&StatusKey::Busy) == Some(0)
    }

    /// Last reported position; unknown axes read as 0
    pub fn current_position(&self) -> Position {
        let axis = |a| self.get_int(&StatusKey::Position(a)).unwrap_or(0);
        Position::new(axis(Axis::X), axis(Axis::Y), axis(Axis::Z))
    }

    /// Copy of every entry
    pub fn snapshot(&self) -> BTreeMap<StatusKey, StatusValue> {
        self.values.clone()
    }

    fn notify(&mut self, diff: &StatusDiff) {
        if diff.is_empty() {
            return;
        }
        tracing::debug!("Status change: {}", diff);
        if let Some(observer) = self.observer.as_mut() {
            observer(diff);
        }
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStore")
            .field("values", &self.values)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
