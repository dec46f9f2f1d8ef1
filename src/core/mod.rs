//! Core module containing the SIM808 driver
//!
//! This module provides:
//! - Transport layer (serial port, virtual modem)
//! - Command catalogue and wire rendering
//! - Response frame with anchor/offset field extraction
//! - Transaction engine (purge, write, CRLF-counted read with timeout)
//! - Device status and power management
//! - HTTP/HTTPS sessions
//! - GNSS power, reporting and fixes

pub mod command;
pub mod engine;
pub mod gnss;
pub mod http;
pub mod modem;
pub mod response;
pub mod simulator;
pub mod status;
pub mod transport;
