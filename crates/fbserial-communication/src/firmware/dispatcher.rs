//! Incoming message dispatcher
//!
//! Routes each decoded message to the status store mutation for its kind.

use fbserial_core::{GcodeMessage, MessageKind, StatusDiff, StatusKey, StatusStore};

/// Apply one decoded message to the status store
///
/// Returns the diff the mutation produced. Kinds without a handler are
/// logged and leave the store untouched.
pub fn dispatch(message: &GcodeMessage, status: &mut StatusStore) -> StatusDiff {
    match message.kind {
        MessageKind::Received | MessageKind::Busy => status.set(StatusKey::Busy, 1),
        MessageKind::Done => status.set(StatusKey::Busy, 0),
        MessageKind::ReportStatusValue
        | MessageKind::ReportPinValue
        | MessageKind::ReportingEndStops
        | MessageKind::ReportCurrentPosition => status.merge_report(message),
        MessageKind::ReportSoftwareVersion => {
            let version = message.raw[message.head.len()..].trim();
            if version.is_empty() {
                tracing::warn!("Version report without a version: {}", message.raw);
                return StatusDiff::default();
            }
            status.set(StatusKey::SoftwareVersion, version)
        }
        MessageKind::Unknown => {
            tracing::warn!("Unknown message from device: {}", message.raw);
            StatusDiff::default()
        }
        MessageKind::Error => {
            tracing::warn!(
                "No handler for '{}' messages, ignoring: {}",
                message.name(),
                message.raw
            );
            StatusDiff::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbserial_core::StatusValue;

    fn run(line: &str, status: &mut StatusStore) -> StatusDiff {
        dispatch(&GcodeMessage::parse(line).unwrap(), status)
    }

    #[test]
    fn test_done_clears_busy() {
        let mut status = StatusStore::new();
        let diff = run("R02", &mut status);
        assert_eq!(diff.to_string(), "{busy: 0}");
        assert!(status.is_ready());
    }

    #[test]
    fn test_received_and_busy_set_busy() {
        let mut status = StatusStore::new();
        run("R02", &mut status);
        assert_eq!(run("R01", &mut status).len(), 1);
        assert!(!status.is_ready());
        run("R02", &mut status);
        run("R04", &mut status);
        assert!(!status.is_ready());
    }

    #[test]
    fn test_version_report() {
        let mut status = StatusStore::new();
        run("R83 GENESIS.1.4", &mut status);
        assert_eq!(
            status.get(&StatusKey::SoftwareVersion),
            Some(&StatusValue::Text("GENESIS.1.4".to_string()))
        );
    }

    #[test]
    fn test_unhandled_kinds_leave_store_alone() {
        let mut status = StatusStore::new();
        let before = status.snapshot();
        assert!(run("R03", &mut status).is_empty());
        assert!(run("R99 X1", &mut status).is_empty());
        assert!(run("R83", &mut status).is_empty());
        assert_eq!(status.snapshot(), before);
    }

    #[test]
    fn test_pin_report() {
        let mut status = StatusStore::new();
        run("R41 P13 V512", &mut status);
        assert_eq!(status.get_int(&StatusKey::Pin(13)), Some(512));
    }
}
