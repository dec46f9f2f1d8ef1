//! Modem handle
//!
//! [`Modem`] ties the transaction engine to the HTTP body buffer and the
//! tuning config. Every protocol operation takes `&mut self`, so one handle
//! can only ever run one transaction at a time. Share it between threads
//! through [`SharedModem`].

use crate::config::ModemConfig;
use crate::core::engine::{Engine, DEFAULT_CRLF};
use crate::core::response::anchor;
use crate::core::transport::Transport;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Modem behind a lock, for callers that need to hand it around
pub type SharedModem<T> = Arc<Mutex<Modem<T>>>;

/// Application data received by the last GET/POST
pub struct PayloadBuffer {
    buf: Vec<u8>,
    len: usize,
    declared: usize,
}

impl PayloadBuffer {
    /// Empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            len: 0,
            declared: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
        self.declared = 0;
    }

    /// Storage for a body of `declared` bytes; the caller reports what it kept
    pub(crate) fn prepare(&mut self, declared: usize) -> &mut [u8] {
        self.clear();
        self.declared = declared;
        &mut self.buf
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// Received bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Number of bytes kept
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing was received
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes kept
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Content length the server announced
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// True when the body did not fit
    pub fn is_truncated(&self) -> bool {
        self.declared > self.len
    }
}

/// SIM808 driver handle
pub struct Modem<T: Transport> {
    pub(crate) engine: Engine<T>,
    pub(crate) payload: PayloadBuffer,
    pub(crate) config: ModemConfig,
}

impl<T: Transport> Modem<T> {
    /// Driver with default buffer sizes and timeouts
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ModemConfig::default())
    }

    /// Driver with explicit tuning
    pub fn with_config(transport: T, config: ModemConfig) -> Self {
        tracing::debug!(
            "modem on {} (frame {} B, payload {} B)",
            transport.connection_info(),
            config.frame_capacity,
            config.payload_capacity
        );
        Self {
            engine: Engine::new(transport, config.frame_capacity),
            payload: PayloadBuffer::new(config.payload_capacity),
            config,
        }
    }

    /// Move into a [`SharedModem`]
    pub fn into_shared(self) -> SharedModem<T> {
        Arc::new(Mutex::new(self))
    }

    /// Tuning in effect
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Body of the last successful GET/POST
    pub fn received(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    /// Body buffer of the last GET/POST, with truncation details
    pub fn payload(&self) -> &PayloadBuffer {
        &self.payload
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        self.engine.transport_mut()
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.engine.into_inner()
    }

    /// Send `command` and report whether `OK` came back within `timeout`
    pub(crate) fn command_ok(&mut self, command: &[u8], timeout: Duration) -> bool {
        self.engine
            .transact_expect(command, anchor::OK, DEFAULT_CRLF, timeout)
    }
}
