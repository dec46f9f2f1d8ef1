//! Byte transport between the driver and the modem
//!
//! Supports:
//! - Serial ports (hardware UART, USB-Serial adapters)
//! - The in-process virtual modem (see [`crate::core::simulator`])
//!
//! The driver only needs write, availability check, single-byte read and a
//! purge of stale input. Everything else is transport specific.

mod serial;

pub use serial::{list_ports, SerialConfig, SerialFlowControl, SerialParity, SerialTransport};

use serde::Serialize;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Read or write timed out at the OS level
    #[error("Transport timeout after {0} ms")]
    Timeout(u64),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Disconnected
    #[error("Disconnected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportStats {
    /// Bytes written to the modem
    pub bytes_sent: u64,
    /// Bytes read from the modem
    pub bytes_received: u64,
    /// Bytes thrown away by purges
    pub bytes_purged: u64,
    /// Write calls
    pub writes: u64,
}

/// Byte-oriented link to the modem.
///
/// Implementations are blocking and single-owner; the driver never calls
/// into a transport from more than one place at a time.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Write all bytes
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Flush pending output
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Number of bytes that can be read without blocking
    fn available(&mut self) -> Result<usize, TransportError>;

    /// Read one byte if one is available
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError>;

    /// Discard everything currently buffered on the input side.
    ///
    /// Returns the number of bytes dropped.
    fn purge(&mut self) -> Result<usize, TransportError> {
        self.flush()?;
        let mut dropped = 0;
        while self.available()? > 0 {
            if self.read_byte()?.is_none() {
                break;
            }
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Human readable description of the link
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        (**self).read_byte()
    }

    fn purge(&mut self) -> Result<usize, TransportError> {
        (**self).purge()
    }

    fn connection_info(&self) -> String {
        (**self).connection_info()
    }

    fn stats(&self) -> TransportStats {
        (**self).stats()
    }
}
