//! Event system for device observation
//!
//! Provides:
//! - Event types for status changes, received messages and link loss
//! - Event dispatcher for publishing events to async subscribers

use crate::gcode::GcodeMessage;
use crate::status::StatusDiff;
use tokio::sync::broadcast;

/// Device event types
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// One status mutation changed these keys
    StatusChanged(StatusDiff),
    /// A line was received and decoded
    MessageReceived(GcodeMessage),
    /// The serial link closed
    Closed,
}

impl std::fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceEvent::StatusChanged(diff) => write!(f, "Status change: {}", diff),
            DeviceEvent::MessageReceived(message) => write!(f, "Message: {}", message),
            DeviceEvent::Closed => write!(f, "Connection closed"),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for device events.
    tx: broadcast::Sender<DeviceEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 100)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Publishing without subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: DeviceEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.publish(DeviceEvent::Closed), 0);
    }

    #[test]
    fn test_subscriber_receives_event() {
        let dispatcher = EventDispatcher::new(4);
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);
        assert_eq!(dispatcher.publish(DeviceEvent::Closed), 1);
        assert!(matches!(rx.try_recv().unwrap(), DeviceEvent::Closed));
    }

    #[test]
    fn test_event_display() {
        let message = GcodeMessage::parse("R02").unwrap();
        let event = DeviceEvent::MessageReceived(message);
        assert_eq!(event.to_string(), "Message: R02 (done)");
    }
}
