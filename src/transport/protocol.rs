// src/transport/protocol.rs
//! Acknowledgment-gated delivery protocol
//!
//! At most one snapshot is in flight; the next one is sent only after the
//! collector acknowledges the previous one, so snapshots arrive in enqueue
//! order and none is dropped.
//!
//! ```text
//! Connecting ──open──▶ OpenIdle ◀──ack── OpenSending
//!      │                  │  └──send──▶      │
//!      └──── finish ──▶ Draining ──last ack──▶ Closed
//! ```
//!
//! The state machine performs no I/O of its own: sends go through a
//! [`Connection`], and the driver reports `on_open`/`on_ack`/`on_closed`.
//! Drive it from one thread, or wrap it in a mutex when the driver runs on
//! another; all of its state is behind that one lock. Completions run with
//! that lock held and must not call back into the protocol.

use crate::observability::{ACKS_TOTAL, SNAPSHOTS_SENT_TOTAL};
use crate::recording::sink::Completion;
use crate::utils::errors::{Result, TraceError};
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// Outbound half of a collector connection
pub trait Connection: Send {
    /// Send a text message (the handshake)
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Send one trace snapshot
    fn send_binary(&mut self, payload: Bytes) -> Result<()>;

    /// Close the connection once everything sent so far is out
    fn close(&mut self) -> Result<()>;
}

/// Observable protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Waiting for the connection to open; snapshots queue up
    Connecting,

    /// Open, nothing awaiting acknowledgment
    OpenIdle,

    /// Open, one snapshot awaiting acknowledgment
    OpenSending,

    /// End requested, queue not yet drained
    Draining,

    /// Connection closed, completion delivered
    Closed,

    /// A transport or protocol error ended the session
    Failed,
}

/// Delivery state machine
pub struct DeliveryProtocol<C: Connection> {
    connection: C,
    handshake: String,
    open: bool,
    closed: bool,
    awaiting_ack: bool,
    pending: VecDeque<Bytes>,
    on_drained: Option<Completion>,
    failure: Option<String>,
    sent: u64,
    acknowledged: u64,
}

impl<C: Connection> DeliveryProtocol<C> {
    /// New protocol over a connection that is still being established
    pub fn new(connection: C, handshake: impl Into<String>) -> Self {
        Self {
            connection,
            handshake: handshake.into(),
            open: false,
            closed: false,
            awaiting_ack: false,
            pending: VecDeque::new(),
            on_drained: None,
            failure: None,
            sent: 0,
            acknowledged: 0,
        }
    }

    pub fn state(&self) -> ProtocolState {
        if self.failure.is_some() {
            ProtocolState::Failed
        } else if self.closed {
            ProtocolState::Closed
        } else if self.on_drained.is_some() {
            ProtocolState::Draining
        } else if !self.open {
            ProtocolState::Connecting
        } else if self.awaiting_ack {
            ProtocolState::OpenSending
        } else {
            ProtocolState::OpenIdle
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Snapshots waiting to be sent (not counting the one in flight)
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// Snapshots handed to the connection so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Error that ended the session, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// The connection is open: send the handshake, then start draining
    pub fn on_open(&mut self) -> Result<()> {
        self.check_usable()?;
        if self.open {
            return self.fail(TraceError::ProtocolViolation(
                "Connection opened twice".to_string(),
            ));
        }

        self.open = true;
        info!("Collector connection open, {} snapshots queued", self.pending.len());

        let handshake = std::mem::take(&mut self.handshake);
        if let Err(e) = self.connection.send_text(&handshake) {
            return self.fail(e);
        }
        self.try_deliver()
    }

    /// Queue a snapshot and send it if nothing is in flight
    pub fn enqueue(&mut self, snapshot: Bytes) -> Result<()> {
        self.check_usable()?;
        if self.on_drained.is_some() {
            return Err(TraceError::SessionEnded);
        }

        self.pending.push_back(snapshot);
        self.try_deliver()
    }

    /// The collector acknowledged the snapshot in flight
    pub fn on_ack(&mut self) -> Result<()> {
        self.check_usable()?;
        if !self.awaiting_ack {
            return self.fail(TraceError::ProtocolViolation(
                "Acknowledgment received with nothing in flight".to_string(),
            ));
        }

        self.awaiting_ack = false;
        self.acknowledged += 1;
        metrics::counter!(ACKS_TOTAL).increment(1);

        if !self.pending.is_empty() {
            return self.try_deliver();
        }

        if let Some(completion) = self.on_drained.take() {
            self.close_connection()?;
            info!("All {} snapshots acknowledged", self.acknowledged);
            completion();
        }

        Ok(())
    }

    /// The connection closed from the far side
    pub fn on_closed(&mut self) -> Result<()> {
        if self.closed || self.failure.is_some() {
            return Ok(());
        }

        let undelivered = self.pending.len() + usize::from(self.awaiting_ack);
        self.open = false;
        self.closed = true;

        if undelivered > 0 || self.on_drained.is_some() {
            return self.fail(TraceError::ProtocolViolation(format!(
                "Connection closed with {} snapshots undelivered",
                undelivered
            )));
        }

        warn!("Collector closed the connection");
        Ok(())
    }

    /// Record a transport failure reported by the driver
    pub fn on_error(&mut self, error: TraceError) {
        let _ = self.fail(error);
    }

    /// Request shutdown: `completion` runs once every snapshot is acknowledged
    pub fn finish(&mut self, completion: Completion) -> Result<()> {
        // The collector may hang up once everything is acknowledged
        if self.closed
            && self.failure.is_none()
            && self.on_drained.is_none()
            && !self.awaiting_ack
            && self.pending.is_empty()
        {
            completion();
            return Ok(());
        }

        self.check_usable()?;
        if self.on_drained.is_some() {
            return Err(TraceError::SessionEnded);
        }

        if !self.awaiting_ack && self.pending.is_empty() {
            self.close_connection()?;
            completion();
        } else {
            debug!(
                "Draining {} queued snapshots before close",
                self.pending.len() + usize::from(self.awaiting_ack)
            );
            self.on_drained = Some(completion);
        }

        Ok(())
    }

    /// Close without waiting for acknowledgments; queued snapshots are lost
    ///
    /// No-op once the session is draining, closed or failed.
    pub fn abandon(&mut self) {
        if self.closed || self.failure.is_some() || self.on_drained.is_some() {
            return;
        }

        let undelivered = self.pending.len() + usize::from(self.awaiting_ack);
        self.pending.clear();
        self.awaiting_ack = false;
        if self.close_connection().is_ok() {
            warn!("Trace session abandoned with {} snapshots undelivered", undelivered);
        }
    }

    fn try_deliver(&mut self) -> Result<()> {
        if !self.open || self.awaiting_ack {
            return Ok(());
        }

        if let Some(snapshot) = self.pending.pop_front() {
            let len = snapshot.len();
            if let Err(e) = self.connection.send_binary(snapshot) {
                return self.fail(e);
            }
            self.awaiting_ack = true;
            self.sent += 1;
            metrics::counter!(SNAPSHOTS_SENT_TOTAL).increment(1);
            debug!("Sent snapshot {} ({} bytes)", self.sent, len);
        }

        Ok(())
    }

    fn close_connection(&mut self) -> Result<()> {
        if self.open {
            if let Err(e) = self.connection.close() {
                return self.fail(e);
            }
        }
        self.open = false;
        self.closed = true;
        Ok(())
    }

    fn check_usable(&self) -> Result<()> {
        if let Some(failure) = &self.failure {
            return Err(TraceError::TransportFailed(failure.clone()));
        }
        if self.closed {
            return Err(TraceError::TransportFailed(
                "Collector connection is closed".to_string(),
            ));
        }
        Ok(())
    }

    fn fail(&mut self, err: TraceError) -> Result<()> {
        error!("Trace delivery failed: {}", err);
        self.failure = Some(err.to_string());
        // Dropping the completion tells a waiting `end` that delivery is over
        self.on_drained = None;
        Err(err)
    }
}
