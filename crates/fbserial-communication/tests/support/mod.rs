#![allow(dead_code)]

use fbserial_communication::{Transport, TransportEvent};
use fbserial_core::{ConnectionError, GcodeMessage, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Produces the device's reply lines for one sent line
pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

/// Test-side view of a mock transport
#[derive(Clone, Default)]
pub struct Wire {
    sent: Arc<Mutex<Vec<String>>>,
    incoming: Arc<Mutex<VecDeque<TransportEvent>>>,
}

impl Wire {
    /// Lines written by the engine so far
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Forget the lines written so far
    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Deliver a line to the engine
    pub fn push_line(&self, line: &str) {
        self.incoming
            .lock()
            .unwrap()
            .push_back(TransportEvent::Line(line.to_string()));
    }

    /// Report the link closed
    pub fn close(&self) {
        self.incoming
            .lock()
            .unwrap()
            .push_back(TransportEvent::Closed);
    }
}

pub struct MockTransport {
    wire: Wire,
    responder: Option<Responder>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> (Self, Wire) {
        let wire = Wire::default();
        (
            Self {
                wire: wire.clone(),
                responder: None,
                closed: false,
            },
            wire,
        )
    }

    pub fn with_responder(responder: Responder) -> (Self, Wire) {
        let (mut transport, wire) = Self::new();
        transport.responder = Some(responder);
        (transport, wire)
    }
}

impl Transport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::Closed.into());
        }
        self.wire.sent.lock().unwrap().push(line.to_string());
        if let Some(responder) = self.responder.as_mut() {
            for reply in responder(line) {
                self.wire.push_line(&reply);
            }
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.wire.incoming.lock().unwrap().pop_front();
        if event == Some(TransportEvent::Closed) {
            self.closed = true;
        }
        event
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

/// Parameter memory of a simulated controller
#[derive(Clone, Default)]
pub struct SimulatedArduino {
    pub parameters: Arc<Mutex<HashMap<u16, i64>>>,
}

impl SimulatedArduino {
    pub fn with_parameters(values: &[(u16, i64)]) -> Self {
        let sim = Self::default();
        sim.parameters.lock().unwrap().extend(values.iter().copied());
        sim
    }

    pub fn parameter(&self, id: u16) -> Option<i64> {
        self.parameters.lock().unwrap().get(&id).copied()
    }

    /// Answers like the firmware: `R01`, an optional report, `R02`
    pub fn responder(&self) -> Responder {
        let parameters = self.parameters.clone();
        Box::new(move |line| {
            let Some(command) = GcodeMessage::parse(line) else {
                return Vec::new();
            };
            let id = command.field("P").unwrap_or(0);
            let mut replies = vec!["R01".to_string()];
            match command.head.as_str() {
                "F21" => {
                    let value = parameters
                        .lock()
                        .unwrap()
                        .get(&(id as u16))
                        .copied()
                        .unwrap_or(0);
                    replies.push(format!("R21 P{} V{}", id, value));
                }
                "F22" => {
                    let value = command.field("V").unwrap_or(0);
                    parameters.lock().unwrap().insert(id as u16, value);
                }
                "F31" => replies.push(format!("R31 P{} V0", id)),
                "F83" => replies.push("R83 GENESIS.1.4".to_string()),
                _ => {}
            }
            replies.push("R02".to_string());
            replies
        })
    }
}

/// Simulated controller on a laggy link
///
/// Each reply's final line arrives one poll after the rest, and writes to
/// the ids in `rejected` are answered with `R03`.
pub struct LaggyTransport {
    responder: Responder,
    sent: Arc<Mutex<Vec<String>>>,
    incoming: VecDeque<Option<String>>,
    rejected: Vec<u16>,
}

impl LaggyTransport {
    pub fn new(sim: &SimulatedArduino, rejected: &[u16]) -> (Self, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                responder: sim.responder(),
                sent: sent.clone(),
                incoming: VecDeque::new(),
                rejected: rejected.to_vec(),
            },
            sent,
        )
    }
}

impl Transport for LaggyTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        let command = GcodeMessage::parse(line);
        let rejected = command.as_ref().is_some_and(|c| {
            c.head == "F22"
                && c.field("P")
                    .is_some_and(|id| self.rejected.contains(&(id as u16)))
        });
        let mut replies = if rejected {
            vec!["R01".to_string(), "R03".to_string()]
        } else {
            (self.responder)(line)
        };
        if let Some(last) = replies.pop() {
            self.incoming.extend(replies.into_iter().map(Some));
            self.incoming.push_back(None);
            self.incoming.push_back(Some(last));
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.incoming.pop_front().flatten().map(TransportEvent::Line)
    }

    fn name(&self) -> String {
        "laggy".to_string()
    }
}
