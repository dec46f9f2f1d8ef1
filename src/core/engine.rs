//! Transaction engine
//!
//! One transaction = purge, write `command\r\n`, purge, then read byte by
//! byte until the requested number of CR LF pairs has been seen, the frame
//! is full, or the timeout expires. The engine owns the response frame; a
//! caller holding the returned borrow keeps every other transaction out.

use crate::core::command::LINE_TERMINATOR;
use crate::core::response::{escape, ResponseFrame};
use crate::core::transport::{Transport, TransportError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Terminator pairs a plain command reply needs: echo/blank line + result
pub const DEFAULT_CRLF: u8 = 2;

/// Transaction failure
#[derive(Error, Debug)]
pub enum TransactError {
    /// No terminator condition within the budget
    #[error("no response within {0} ms")]
    Timeout(u64),

    /// The link itself failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outcome of a payload copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadCopy {
    /// Bytes stored in the caller's buffer
    pub stored: usize,
    /// Bytes read from the link but thrown away for lack of room
    pub dropped: usize,
}

/// Command/response engine over a [`Transport`]
pub struct Engine<T: Transport> {
    transport: T,
    frame: ResponseFrame,
}

impl<T: Transport> Engine<T> {
    /// Wrap `transport` with a response frame of `frame_capacity` bytes
    pub fn new(transport: T, frame_capacity: usize) -> Self {
        Self {
            transport,
            frame: ResponseFrame::new(frame_capacity),
        }
    }

    /// Last frame read
    pub fn frame(&self) -> &ResponseFrame {
        &self.frame
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write one command line, discarding stale input before and the echo after
    pub fn send(&mut self, command: &[u8]) -> Result<(), TransactError> {
        tracing::debug!(">> {}", escape(command));
        let stale = self.transport.purge()?;
        if stale > 0 {
            tracing::trace!("purged {} stale bytes before command", stale);
        }
        let mut line = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
        line.extend_from_slice(command);
        line.extend_from_slice(LINE_TERMINATOR);
        self.transport.write(&line)?;
        self.transport.purge()?;
        Ok(())
    }

    /// Write bytes verbatim (no terminator), after a purge
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), TransactError> {
        tracing::debug!(">> {} raw bytes", data.len());
        self.transport.purge()?;
        self.transport.write(data)?;
        self.transport.flush()?;
        Ok(())
    }

    /// Read into the frame until `crlf_to_wait` CR LF pairs were seen.
    ///
    /// A full frame ends the read successfully with whatever fit. The
    /// timeout runs from the start of this call.
    pub fn read_response(
        &mut self,
        crlf_to_wait: u8,
        timeout: Duration,
    ) -> Result<&ResponseFrame, TransactError> {
        let wanted = crlf_to_wait.max(1);
        let mut seen_cr = false;
        let mut count = 0u8;

        self.frame.clear();
        let start = Instant::now();

        loop {
            if self.transport.available()? > 0 {
                if let Some(byte) = self.transport.read_byte()? {
                    self.frame.push(byte);
                    match byte {
                        b'\r' => seen_cr = true,
                        b'\n' if seen_cr => {
                            seen_cr = false;
                            count += 1;
                            if count >= wanted {
                                break;
                            }
                        }
                        _ => seen_cr = false,
                    }
                    if self.frame.is_full() {
                        tracing::warn!(
                            "response truncated at {} bytes",
                            self.frame.capacity()
                        );
                        break;
                    }
                    continue;
                }
            }
            if start.elapsed() > timeout {
                tracing::warn!(
                    "timeout after {} ms, partial: {}",
                    timeout.as_millis(),
                    escape(self.frame.as_bytes())
                );
                return Err(TransactError::Timeout(timeout.as_millis() as u64));
            }
            std::thread::yield_now();
        }

        tracing::debug!("<< {}", escape(self.frame.as_bytes()));
        Ok(&self.frame)
    }

    /// [`send`](Self::send) followed by [`read_response`](Self::read_response)
    pub fn transact(
        &mut self,
        command: &[u8],
        crlf_to_wait: u8,
        timeout: Duration,
    ) -> Result<&ResponseFrame, TransactError> {
        self.send(command)?;
        self.read_response(crlf_to_wait, timeout)
    }

    /// Run a transaction and report whether `expected` shows up in the reply
    pub fn transact_expect(
        &mut self,
        command: &[u8],
        expected: &[u8],
        crlf_to_wait: u8,
        timeout: Duration,
    ) -> bool {
        match self.transact(command, crlf_to_wait, timeout) {
            Ok(frame) => frame.contains(expected),
            Err(e) => {
                tracing::warn!("{}: {}", escape(command), e);
                false
            }
        }
    }

    /// Read without sending first and report whether `expected` shows up
    pub fn expect(&mut self, expected: &[u8], crlf_to_wait: u8, timeout: Duration) -> bool {
        match self.read_response(crlf_to_wait, timeout) {
            Ok(frame) => frame.contains(expected),
            Err(e) => {
                tracing::warn!("waiting for {}: {}", escape(expected), e);
                false
            }
        }
    }

    /// Copy a declared-length body into `out`.
    ///
    /// CR and LF bytes are skipped and do not count. Bytes beyond
    /// `out.len()` are read and dropped so the link is left at the trailer.
    /// Each byte must arrive within `byte_timeout`.
    pub fn read_payload(
        &mut self,
        out: &mut [u8],
        declared: usize,
        byte_timeout: Duration,
    ) -> Result<PayloadCopy, TransactError> {
        let keep = declared.min(out.len());
        let mut copy = PayloadCopy {
            stored: 0,
            dropped: 0,
        };

        while copy.stored + copy.dropped < declared {
            let byte = self.next_byte(byte_timeout)?;
            if byte == b'\r' || byte == b'\n' {
                continue;
            }
            if copy.stored < keep {
                out[copy.stored] = byte;
                copy.stored += 1;
            } else {
                copy.dropped += 1;
            }
        }

        if copy.dropped > 0 {
            tracing::warn!(
                "payload truncated to {} bytes, {} dropped",
                copy.stored,
                copy.dropped
            );
        }
        Ok(copy)
    }

    fn next_byte(&mut self, timeout: Duration) -> Result<u8, TransactError> {
        let start = Instant::now();
        loop {
            if self.transport.available()? > 0 {
                if let Some(byte) = self.transport.read_byte()? {
                    return Ok(byte);
                }
            }
            if start.elapsed() > timeout {
                return Err(TransactError::Timeout(timeout.as_millis() as u64));
            }
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::simulator::{ResponseRule, VirtualModem};
    use crate::core::transport::MockTransport;

    const SHORT: Duration = Duration::from_millis(40);

    fn engine(device: VirtualModem) -> Engine<VirtualModem> {
        Engine::new(device, 256)
    }

    #[test]
    fn test_link_counters_track_transaction_and_purge() {
        let mut device = VirtualModem::new("t").with_rule(ResponseRule::exact("AT", "\r\nOK\r\n"));
        device.inject(b"+CREG: 1\r\n");
        assert_eq!(device.available().unwrap(), 10);

        let mut engine = engine(device);
        let frame = engine.transact(b"AT", DEFAULT_CRLF, SHORT).unwrap();
        assert_eq!(frame.as_bytes(), b"\r\nOK\r\n");

        let stats = engine.transport().stats();
        assert_eq!(stats.bytes_sent, 4);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.bytes_purged, 10);
        assert_eq!(stats.bytes_received, 6);
    }

    #[test]
    fn test_transact_stops_after_two_terminators() {
        let device = VirtualModem::new("t").with_rule(ResponseRule::exact(
            "AT+CSQ",
            "AT+CSQ\r\n+CSQ: 31,0\r\n\r\nOK\r\n",
        ));
        let mut engine = engine(device);
        let frame = engine.transact(b"AT+CSQ", DEFAULT_CRLF, SHORT).unwrap();
        assert_eq!(frame.as_bytes(), b"AT+CSQ\r\n+CSQ: 31,0\r\n");
        // The rest stays on the link until the next purge
        assert_eq!(engine.transport_mut().available().unwrap(), 6);
    }

    #[test]
    fn test_command_is_written_with_terminator() {
        let mut engine = engine(VirtualModem::new("t"));
        engine.send(b"AT+HTTPINIT").unwrap();
        assert_eq!(engine.transport().written(), &[b"AT+HTTPINIT\r\n".to_vec()]);
    }

    #[test]
    fn test_lone_cr_and_lf_do_not_count() {
        let mut device = VirtualModem::new("t");
        device.inject(b"a\rb\nc\r\nd\r\n");
        let mut engine = engine(device);
        let frame = engine.read_response(2, SHORT).unwrap();
        assert_eq!(frame.as_bytes(), b"a\rb\nc\r\nd\r\n");
    }

    #[test]
    fn test_timeout_is_at_least_budget() {
        let mut engine = engine(VirtualModem::new("silent"));
        let start = Instant::now();
        let err = engine.transact(b"AT", DEFAULT_CRLF, SHORT).unwrap_err();
        assert!(matches!(err, TransactError::Timeout(40)));
        assert!(start.elapsed() >= SHORT);
    }

    #[test]
    fn test_single_terminator_is_not_enough() {
        let device = VirtualModem::new("t").with_rule(ResponseRule::exact("AT", "OK\r\n"));
        let mut engine = engine(device);
        assert!(engine.transact(b"AT", DEFAULT_CRLF, SHORT).is_err());
        assert_eq!(engine.frame().as_bytes(), b"OK\r\n");
    }

    #[test]
    fn test_full_frame_is_truncation_not_failure() {
        let device = VirtualModem::new("t")
            .with_rule(ResponseRule::exact("ATI", "\r\nSIM808 R14.18 with a long tail\r\n"));
        let mut engine = Engine::new(device, 8);
        let frame = engine.transact(b"ATI", DEFAULT_CRLF, SHORT).unwrap();
        assert!(frame.is_full());
        assert_eq!(frame.as_bytes(), b"\r\nSIM808");
    }

    #[test]
    fn test_frame_is_cleared_between_transactions() {
        let device = VirtualModem::new("t")
            .with_rule(ResponseRule::exact("A", "\r\nLONG REPLY\r\n"))
            .with_rule(ResponseRule::exact("B", "\r\nOK\r\n"));
        let mut engine = engine(device);
        engine.transact(b"A", DEFAULT_CRLF, SHORT).unwrap();
        let frame = engine.transact(b"B", DEFAULT_CRLF, SHORT).unwrap();
        assert_eq!(frame.as_bytes(), b"\r\nOK\r\n");
    }

    #[test]
    fn test_stale_bytes_are_purged_before_command() {
        let mut device = VirtualModem::new("t").with_rule(ResponseRule::exact("AT", "\r\nOK\r\n"));
        device.inject(b"\r\n+HTTPACTION: 0,200,5\r\n");
        let mut engine = engine(device);
        // Make the late bytes "arrive" before the next command
        engine.transport_mut().available().unwrap();
        let frame = engine.transact(b"AT", DEFAULT_CRLF, SHORT).unwrap();
        assert_eq!(frame.as_bytes(), b"\r\nOK\r\n");
    }

    #[test]
    fn test_transact_expect() {
        let device = VirtualModem::new("t")
            .with_rule(ResponseRule::exact("AT", "\r\nOK\r\n"))
            .with_rule(ResponseRule::exact("AT+X", "\r\nERROR\r\n"));
        let mut engine = engine(device);
        assert!(engine.transact_expect(b"AT", b"OK", DEFAULT_CRLF, SHORT));
        assert!(!engine.transact_expect(b"AT+X", b"OK", DEFAULT_CRLF, SHORT));
        assert!(!engine.transact_expect(b"AT+Y", b"OK", DEFAULT_CRLF, SHORT));
    }

    #[test]
    fn test_read_payload_skips_line_breaks() {
        let mut device = VirtualModem::new("t");
        device.inject(b"he\r\nllo\r\nOK\r\n");
        let mut engine = engine(device);
        let mut out = [0u8; 16];
        let copy = engine.read_payload(&mut out, 5, SHORT).unwrap();
        assert_eq!(copy, PayloadCopy { stored: 5, dropped: 0 });
        assert_eq!(&out[..5], b"hello");
        assert!(engine.expect(b"OK", DEFAULT_CRLF, SHORT));
    }

    #[test]
    fn test_read_payload_drops_excess() {
        let mut device = VirtualModem::new("t");
        device.inject(b"0123456789\r\nOK\r\n");
        let mut engine = engine(device);
        let mut out = [0u8; 4];
        let copy = engine.read_payload(&mut out, 10, SHORT).unwrap();
        assert_eq!(copy, PayloadCopy { stored: 4, dropped: 6 });
        assert_eq!(&out, b"0123");
        assert!(engine.expect(b"OK", DEFAULT_CRLF, SHORT));
    }

    #[test]
    fn test_read_payload_times_out_on_stall() {
        let mut device = VirtualModem::new("t");
        device.inject(b"hel");
        let mut engine = engine(device);
        let mut out = [0u8; 8];
        let err = engine.read_payload(&mut out, 5, SHORT).unwrap_err();
        assert!(matches!(err, TransactError::Timeout(_)));
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let mut mock = MockTransport::new();
        mock.expect_purge().returning(|| Ok(0));
        mock.expect_write()
            .returning(|_| Err(TransportError::Disconnected));
        let mut engine = Engine::new(mock, 32);
        let err = engine.transact(b"AT", DEFAULT_CRLF, SHORT).unwrap_err();
        assert!(matches!(err, TransactError::Transport(TransportError::Disconnected)));
    }

    #[test]
    fn test_read_error_aborts_read() {
        let mut mock = MockTransport::new();
        mock.expect_available()
            .returning(|| Err(TransportError::IoError(std::io::Error::other("unplugged"))));
        let mut engine = Engine::new(mock, 32);
        assert!(matches!(
            engine.read_response(DEFAULT_CRLF, SHORT),
            Err(TransactError::Transport(TransportError::IoError(_)))
        ));
    }
}
