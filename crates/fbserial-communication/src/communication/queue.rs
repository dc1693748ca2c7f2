//! Outbound command queue with readiness gating
//!
//! Commands wait here until the device reports ready. Each scheduling tick
//! asks the queue what to do next:
//! - device ready and a command pending: release the oldest command
//! - device busy and a command pending: poll the device and keep waiting
//! - nothing pending: do nothing
//!
//! The queue owns the wait timer so the caller can report how long the
//! device kept it waiting.

use fbserial_core::Command;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// What one tick decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing pending
    Idle,
    /// The oldest command was released
    Sent {
        /// The released command
        command: Command,
        /// How long the device kept it waiting, when that was non-zero
        waited: Option<Duration>,
    },
    /// The device is busy; a status poll is due
    Polled {
        /// Time since the wait started
        waiting_for: Duration,
    },
}

/// FIFO of commands not yet written to the transport
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Command>,
    waiting_since: Option<Instant>,
}

impl OutboundQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command behind everything already pending
    pub fn enqueue(&mut self, command: Command) {
        tracing::debug!("Queued {}", command);
        self.pending.push_back(command);
    }

    /// Put a command back at the head, e.g. after a failed write
    pub fn requeue_front(&mut self, command: Command) {
        self.pending.push_front(command);
    }

    /// Number of pending commands
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending commands, oldest first
    pub fn pending(&self) -> impl Iterator<Item = &Command> {
        self.pending.iter()
    }

    /// Drop every pending command and the wait timer; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.waiting_since = None;
        dropped
    }

    /// Time the queue has been waiting for the device, if it is waiting
    pub fn waiting_for(&self, now: Instant) -> Option<Duration> {
        self.waiting_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Decide the step for one tick
    pub fn next(&mut self, ready: bool, now: Instant) -> FlushOutcome {
        if self.pending.is_empty() {
            return FlushOutcome::Idle;
        }

        if !ready {
            let since = *self.waiting_since.get_or_insert(now);
            return FlushOutcome::Polled {
                waiting_for: now.saturating_duration_since(since),
            };
        }

        let waited = self
            .waiting_since
            .take()
            .map(|since| now.saturating_duration_since(since))
            .filter(|waited| !waited.is_zero());

        match self.pending.pop_front() {
            Some(command) => FlushOutcome::Sent { command, waited },
            None => FlushOutcome::Idle,
        }
    }
}
