//! # SIM808 Core Library
//!
//! A synchronous driver for SIMCom SIM808/SIM868 GSM/GPRS+GNSS modules
//! over a serial link:
//! - AT transactions with CRLF-counted framing and timeouts
//! - Signal, registration and power mode management
//! - GPRS bearer setup
//! - HTTP/HTTPS GET and POST through the module's HTTP stack
//! - GNSS power, URC reporting and navigation fixes
//!
//! ## Features
//!
//! - Fixed-capacity response and payload buffers, truncation instead of overflow
//! - Pluggable [`Transport`], with a scriptable virtual modem for tests
//! - CLI with exit codes and JSON output
//!
//! ## Example
//!
//! ```rust,no_run
//! use sim808_core::{Modem, SerialConfig, SerialTransport};
//!
//! fn main() -> anyhow::Result<()> {
//!     let transport = SerialTransport::open(SerialConfig::new("/dev/ttyUSB0", 9600))?;
//!     let mut modem = Modem::new(transport);
//!
//!     if modem.setup_gprs("internet") && modem.connect_gprs() {
//!         let status = modem.http_get("http://example.com", None, 10_000)?;
//!         println!("{}: {}", status, String::from_utf8_lossy(modem.received()));
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, ConfigError, LoggingConfig, ModemConfig};
pub use crate::core::command::Command;
pub use crate::core::engine::{Engine, TransactError, DEFAULT_CRLF};
pub use crate::core::gnss::{GnssInfo, GnssReport, GnssStatus};
pub use crate::core::http::{http_status_code, HttpError, HttpMethod, HttpRequest};
pub use crate::core::modem::{Modem, PayloadBuffer, SharedModem};
pub use crate::core::response::ResponseFrame;
pub use crate::core::simulator::{DeviceTemplates, ResponseRule, VirtualModem};
pub use crate::core::status::{NetworkRegistration, PowerMode};
pub use crate::core::transport::{
    SerialConfig, SerialFlowControl, SerialParity, SerialTransport, Transport, TransportError,
    TransportStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
