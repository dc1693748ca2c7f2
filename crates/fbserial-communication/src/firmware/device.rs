//! Device synchronization engine
//!
//! [`Device`] is the single owner of the transport, the status store and
//! the outbound queue. Everything that writes to the serial link goes
//! through it: queued commands released by [`Device::tick`], the readiness
//! poll, the emergency stop and the parameter round-trips used by the
//! reconciler.

use crate::clock::{Clock, SystemClock};
use crate::communication::{FlushOutcome, OutboundQueue, Transport, TransportEvent};
use crate::firmware::dispatcher::dispatch;
use crate::firmware::parameters::ParameterChannel;
use fbserial_core::{
    parameter_name, Command, ConnectionError, DeviceEvent, Error, EventDispatcher, GcodeMessage,
    MessageKind, ParameterError, Result, StatusKey, StatusStore, StatusValue,
};
use fbserial_settings::EngineSettings;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Shared copy of the status store, kept current by the engine
pub type SharedStatus = Arc<RwLock<BTreeMap<StatusKey, StatusValue>>>;

/// Pause between transport polls while a round-trip waits for its reply
const EXCHANGE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The device engine
pub struct Device<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    settings: EngineSettings,
    status: StatusStore,
    queue: OutboundQueue,
    events: EventDispatcher,
    shared: SharedStatus,
    closed: bool,
}

impl<T: Transport> Device<T, SystemClock> {
    /// Create an engine over an open transport
    pub fn new(transport: T, settings: EngineSettings) -> Self {
        Self::with_clock(transport, SystemClock, settings)
    }
}

impl<T: Transport, C: Clock> Device<T, C> {
    /// Create an engine with an explicit clock
    pub fn with_clock(transport: T, clock: C, settings: EngineSettings) -> Self {
        let events = EventDispatcher::new(settings.event_capacity);
        let mut status = StatusStore::new();
        let shared: SharedStatus = Arc::new(RwLock::new(status.snapshot()));

        let observer_events = events.clone();
        let observer_shared = shared.clone();
        status.on_change(move |diff| {
            {
                let mut snapshot = observer_shared.write();
                for (key, value) in diff.iter() {
                    snapshot.insert(key.clone(), value.clone());
                }
            }
            observer_events.publish(DeviceEvent::StatusChanged(diff.clone()));
        });

        tracing::debug!("Device engine created on {}", transport.name());

        Self {
            transport,
            clock,
            settings,
            status,
            queue: OutboundQueue::new(),
            events,
            shared,
            closed: false,
        }
    }

    /// Current status
    pub fn status(&self) -> &StatusStore {
        &self.status
    }

    /// Shared status snapshot for readers on other tasks
    pub fn shared_status(&self) -> SharedStatus {
        self.shared.clone()
    }

    /// Event dispatcher the engine publishes to
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to status changes, received messages and link loss
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Pending outbound commands
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Engine settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Whether the transport reported the link closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// How long queued commands have been waiting for the device to become ready
    pub fn waiting_for(&self) -> Option<Duration> {
        self.queue.waiting_for(self.clock.now())
    }

    pub(crate) fn status_mut(&mut self) -> &mut StatusStore {
        &mut self.status
    }

    /// Queue a command behind everything already pending
    pub fn enqueue(&mut self, command: Command) {
        self.queue.enqueue(command);
    }

    /// Handle one transport event; returns the decoded message, if any
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<GcodeMessage> {
        match event {
            TransportEvent::Line(line) => self.handle_line(&line),
            TransportEvent::Closed => {
                self.handle_close();
                None
            }
        }
    }

    /// Decode and dispatch one received line
    pub fn handle_line(&mut self, line: &str) -> Option<GcodeMessage> {
        let message = GcodeMessage::parse(line)?;
        tracing::debug!("Received {}", message);
        dispatch(&message, &mut self.status);
        self.events
            .publish(DeviceEvent::MessageReceived(message.clone()));
        Some(message)
    }

    /// Record that the link is gone; only the first call has an effect
    pub fn handle_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::info!("Connection to device lost");
        self.events.publish(DeviceEvent::Closed);
    }

    /// Handle every event the transport has ready; returns how many were handled
    pub fn poll_transport(&mut self) -> usize {
        let mut handled = 0;
        while !self.closed {
            match self.transport.poll_event() {
                Some(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                None => break,
            }
        }
        handled
    }

    /// One scheduling step of the outbound queue
    ///
    /// Releases the oldest command when the device is ready, otherwise
    /// writes the readiness poll. Does nothing once the link is closed.
    pub fn tick(&mut self) -> Result<FlushOutcome> {
        if self.closed {
            return Ok(FlushOutcome::Idle);
        }

        let outcome = self.queue.next(self.status.is_ready(), self.clock.now());
        match &outcome {
            FlushOutcome::Idle => {}
            FlushOutcome::Polled { .. } => {
                self.write(&Command::read_status(self.settings.poll_status_id))?;
            }
            FlushOutcome::Sent { command, waited } => {
                if let Some(waited) = waited {
                    tracing::info!(
                        "Device became ready after {} seconds",
                        waited.as_secs()
                    );
                }
                if let Err(e) = self.write(command) {
                    self.queue.requeue_front(command.clone());
                    return Err(e);
                }
                // Busy until the device acknowledges; keeps the next tick from
                // releasing another command ahead of the `R01`.
                self.status.set(StatusKey::Busy, 1);
            }
        }
        Ok(outcome)
    }

    /// Drop every pending command and write the stop line directly
    pub fn emergency_stop(&mut self) -> Result<()> {
        let dropped = self.queue.clear();
        if dropped > 0 {
            tracing::info!("Emergency stop dropped {} pending commands", dropped);
        }
        self.write(&Command::emergency_stop())?;
        self.status.set(StatusKey::Last, "emergency_stop");
        Ok(())
    }

    fn write(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::Closed.into());
        }
        let line = command.encode();
        tracing::debug!("Sending {}", line);
        self.transport.send_line(&line)
    }

    /// Write a command directly and wait until `step` settles the exchange
    ///
    /// Lines already buffered are handled first so a stale reply cannot
    /// settle the exchange. Every line received while waiting is dispatched
    /// as usual and then offered to `step`.
    fn exchange<R>(
        &mut self,
        command: &Command,
        waiting_for: String,
        mut step: impl FnMut(&GcodeMessage) -> Option<Result<R>>,
    ) -> Result<R> {
        self.poll_transport();
        self.write(command)?;

        let deadline = self.clock.now() + self.settings.exchange_timeout();
        loop {
            if self.clock.now() >= deadline {
                tracing::warn!("No reply to {} (waiting for {})", command, waiting_for);
                return Err(ConnectionError::Timeout {
                    waiting_for,
                    timeout_ms: self.settings.exchange_timeout_ms,
                }
                .into());
            }

            match self.transport.poll_event() {
                Some(event) => {
                    if let Some(outcome) = self.handle_event(event).as_ref().and_then(&mut step) {
                        return outcome;
                    }
                    if self.closed {
                        return Err(ConnectionError::Closed.into());
                    }
                }
                None => self.clock.pause(EXCHANGE_POLL_INTERVAL),
            }
        }
    }
}

fn rejected(command: &Command) -> Error {
    Error::other(format!("device rejected {}", command))
}

impl<T: Transport, C: Clock> ParameterChannel for Device<T, C> {
    /// Waits for `R21 P<id>` and then the command's own `R02`, so the
    /// terminator never lingers for the next exchange
    fn read_parameter(&mut self, id: u16) -> Result<i64> {
        let command = Command::read_parameter(id);
        let expected = i64::from(id);
        let mut reported: Option<Option<i64>> = None;
        self.exchange(&command, format!("R21 P{} and R02", id), |message| {
            match message.kind {
                MessageKind::ReportStatusValue
                    if message.head == "R21" && message.field("P") == Some(expected) =>
                {
                    reported = Some(message.field("V"));
                    None
                }
                // A done before the report belongs to an earlier command.
                MessageKind::Done => reported.map(|value| {
                    value.ok_or_else(|| Error::from(ParameterError::MissingReply { id }))
                }),
                MessageKind::Error => Some(Err(rejected(&command))),
                _ => None,
            }
        })
    }

    fn write_parameter(&mut self, id: u16, value: i64) -> Result<()> {
        let command = Command::write_parameter(id, value);
        self.exchange(&command, "R02".to_string(), |message| match message.kind {
            MessageKind::Done => Some(Ok(())),
            MessageKind::Error => Some(Err(rejected(&command))),
            _ => None,
        })?;
        self.status
            .set(StatusKey::Parameter(parameter_name(id)), value);
        Ok(())
    }
}
