//! Incoming messages
//!
//! Decodes one received line (`R82 X10 Y20 Z0`) into its opcode, the
//! resolved message kind and its numeric fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `R01` command received
    Received,
    /// `R02` command finished
    Done,
    /// `R03` command failed
    Error,
    /// `R04` still executing
    Busy,
    /// `R21`/`R31` parameter or status register value
    ReportStatusValue,
    /// `R41` pin value
    ReportPinValue,
    /// `R81` end-stop states
    ReportingEndStops,
    /// `R82` current position
    ReportCurrentPosition,
    /// `R83` firmware version
    ReportSoftwareVersion,
    /// Opcode missing from the table
    Unknown,
}

impl MessageKind {
    /// Resolve an opcode token
    pub fn from_head(head: &str) -> Self {
        match head {
            "R01" => Self::Received,
            "R02" => Self::Done,
            "R03" => Self::Error,
            "R04" => Self::Busy,
            "R21" | "R31" => Self::ReportStatusValue,
            "R41" => Self::ReportPinValue,
            "R81" => Self::ReportingEndStops,
            "R82" => Self::ReportCurrentPosition,
            "R83" => Self::ReportSoftwareVersion,
            _ => Self::Unknown,
        }
    }

    /// Snake-case name of the kind
    pub fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Done => "done",
            Self::Error => "error",
            Self::Busy => "busy",
            Self::ReportStatusValue => "report_status_value",
            Self::ReportPinValue => "report_pin_value",
            Self::ReportingEndStops => "reporting_end_stops",
            Self::ReportCurrentPosition => "report_current_position",
            Self::ReportSoftwareVersion => "report_software_version",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded incoming line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcodeMessage {
    /// Opcode token, upper-cased
    pub head: String,
    /// Resolved kind
    pub kind: MessageKind,
    /// `LETTER<integer>` fields in line order
    pub fields: Vec<(String, i64)>,
    /// Tokens that are not `LETTER<integer>` fields, e.g. a version string
    pub args: Vec<String>,
    /// The line as received, trimmed
    pub raw: String,
}

impl GcodeMessage {
    /// Decode one line
    ///
    /// Returns `None` for blank lines. Unknown opcodes decode to
    /// [`MessageKind::Unknown`] with the raw line kept for logging.
    pub fn parse(line: &str) -> Option<Self> {
        let raw = line.trim();
        let mut tokens = raw.split_whitespace();
        let head = tokens.next()?.to_ascii_uppercase();

        let mut fields = Vec::new();
        let mut args = Vec::new();
        for token in tokens {
            match split_field(token) {
                Some(field) => fields.push(field),
                None => args.push(token.to_string()),
            }
        }

        Some(Self {
            kind: MessageKind::from_head(&head),
            head,
            fields,
            args,
            raw: raw.to_string(),
        })
    }

    /// Semantic name of the message
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Value of the first field with this key
    pub fn field(&self, key: &str) -> Option<i64> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Whether the opcode is a device report (`R..`)
    pub fn is_report(&self) -> bool {
        self.head.starts_with('R')
    }
}

impl fmt::Display for GcodeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.raw, self.kind)
    }
}

/// Split `XA1` into `("XA", 1)`
fn split_field(token: &str) -> Option<(String, i64)> {
    let split = token.find(|c: char| !c.is_ascii_alphabetic())?;
    let (key, value) = token.split_at(split);
    if key.is_empty() {
        return None;
    }
    let value = value.parse::<i64>().ok()?;
    Some((key.to_ascii_uppercase(), value))
}
