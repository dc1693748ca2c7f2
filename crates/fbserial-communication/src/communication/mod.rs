//! Transport abstraction and the outbound queue
//!
//! The engine only deals in assembled lines: a [`Transport`] sends one
//! line and yields received lines one at a time, plus a single
//! [`TransportEvent::Closed`] when the link goes away.

pub mod queue;
pub mod serial;

pub use queue::{FlushOutcome, OutboundQueue};

use fbserial_core::Result;

/// Something the transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One received line, without its terminator
    Line(String),
    /// The link is gone; reported once
    Closed,
}

/// Line-oriented link to the device
pub trait Transport: Send {
    /// Write one line; the terminator is added by the transport
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Next received event, or `None` when nothing is available right now
    ///
    /// Implementations may block briefly (a port read timeout) but never
    /// indefinitely.
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Human-readable name of the link
    fn name(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_line(&mut self, line: &str) -> Result<()> {
        (**self).send_line(line)
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        (**self).poll_event()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
