//! Async host for the device engine
//!
//! [`spawn`] moves a [`Device`] onto one tokio task. Each loop iteration
//! handles everything the transport has received, applies caller requests,
//! performs one flush tick and then sleeps for the tick interval. The task
//! is the only writer to the transport, so queued commands, readiness polls,
//! the emergency stop and reconciliation round-trips never interleave.

use crate::clock::Clock;
use crate::communication::Transport;
use crate::firmware::commands::DeviceCommand;
use crate::firmware::device::{Device, SharedStatus};
use crate::firmware::parameters::{ParameterReconciler, ReconcileOutcome};
use fbserial_core::{ConnectionError, DeviceEvent, EventDispatcher, Result, StatusKey, StatusValue};
use fbserial_settings::ParameterStore;
use std::collections::BTreeMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

enum Request {
    Command(DeviceCommand, oneshot::Sender<Result<()>>),
    CheckParameters(oneshot::Sender<Result<ReconcileOutcome>>),
}

impl Request {
    fn reject(self) {
        match self {
            Request::Command(_, reply) => {
                let _ = reply.send(Err(ConnectionError::Closed.into()));
            }
            Request::CheckParameters(reply) => {
                let _ = reply.send(Err(ConnectionError::Closed.into()));
            }
        }
    }
}

/// Cloneable handle to a running engine
#[derive(Clone)]
pub struct DeviceHandle {
    requests: mpsc::Sender<Request>,
    status: SharedStatus,
    events: EventDispatcher,
}

impl DeviceHandle {
    /// Submit a request and wait until the engine has applied it
    ///
    /// Commands are applied when the engine accepts them, not when the
    /// device executes them; queued commands are released by later ticks.
    pub async fn execute(&self, command: DeviceCommand) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Command(command, reply))
            .await
            .map_err(|_| ConnectionError::Closed)?;
        response.await.map_err(|_| ConnectionError::Closed)?
    }

    /// Drop the queue and stop immediately
    pub async fn emergency_stop(&self) -> Result<()> {
        self.execute(DeviceCommand::EmergencyStop).await
    }

    /// Run parameter reconciliation on the engine task
    pub async fn check_parameters(&self) -> Result<ReconcileOutcome> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::CheckParameters(reply))
            .await
            .map_err(|_| ConnectionError::Closed)?;
        response.await.map_err(|_| ConnectionError::Closed)?
    }

    /// Copy of the current status
    pub fn status(&self) -> BTreeMap<StatusKey, StatusValue> {
        self.status.read().clone()
    }

    /// Whether the device last reported ready
    pub fn is_ready(&self) -> bool {
        self.status
            .read()
            .get(&StatusKey::Busy)
            .and_then(StatusValue::as_int)
            == Some(0)
    }

    /// Subscribe to status changes, received messages and link loss
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Whether the engine task has stopped
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

/// Start the engine task
pub fn spawn<T, C, S>(
    mut device: Device<T, C>,
    mut reconciler: ParameterReconciler<S>,
) -> (DeviceHandle, JoinHandle<()>)
where
    T: Transport + 'static,
    C: Clock + 'static,
    S: ParameterStore + Send + 'static,
{
    let (requests_tx, mut requests_rx) = mpsc::channel::<Request>(100);
    let handle = DeviceHandle {
        requests: requests_tx,
        status: device.shared_status(),
        events: device.events().clone(),
    };
    let tick_interval = device.settings().tick_interval();

    let task = tokio::spawn(async move {
        loop {
            // 1. READ PHASE
            device.poll_transport();
            if device.is_closed() {
                break;
            }

            // 2. REQUEST PHASE
            loop {
                match requests_rx.try_recv() {
                    Ok(Request::Command(command, reply)) => {
                        let name = command.name();
                        let result = device.apply(command);
                        if let Err(e) = &result {
                            tracing::warn!("{} rejected: {}", name, e);
                        }
                        let _ = reply.send(result);
                    }
                    Ok(Request::CheckParameters(reply)) => {
                        let result = reconciler.check_parameters(&mut device);
                        if let Err(e) = &result {
                            tracing::warn!("Parameter check failed: {}", e);
                        }
                        let _ = reply.send(result);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("All device handles dropped, stopping engine");
                        return;
                    }
                }
            }
            if device.is_closed() {
                break;
            }

            // 3. FLUSH PHASE
            if let Err(e) = device.tick() {
                tracing::warn!("Flush failed: {}", e);
            }

            tokio::time::sleep(tick_interval).await;
        }

        requests_rx.close();
        while let Ok(request) = requests_rx.try_recv() {
            request.reject();
        }
        tracing::info!("Device engine stopped");
    });

    (handle, task)
}
