//! Serial port transport implementation

use super::{Transport, TransportError, TransportStats};
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

/// Serial port flow control type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialFlowControl {
    /// No flow control
    #[default]
    None,
    /// Hardware flow control (RTS/CTS)
    Hardware,
    /// Software flow control (XON/XOFF)
    Software,
}

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl std::str::FromStr for SerialParity {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            other => Err(TransportError::InvalidConfiguration(format!(
                "unknown parity '{}'",
                other
            ))),
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
    /// Flow control
    pub flow_control: SerialFlowControl,
}

impl SerialConfig {
    /// Create a new serial configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
            flow_control: SerialFlowControl::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    /// Set flow control
    #[must_use]
    pub fn flow_control(mut self, flow: SerialFlowControl) -> Self {
        self.flow_control = flow;
        self
    }
}

impl Default for SerialConfig {
    // SIM808 modules ship with autobauding; 9600 is the safe default.
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", 9600)
    }
}

/// Serial port transport
pub struct SerialTransport {
    config: SerialConfig,
    port: Box<dyn SerialPort>,
    rx: VecDeque<u8>,
    stats: TransportStats,
}

impl SerialTransport {
    /// Open the port described by `config`
    pub fn open(config: SerialConfig) -> Result<Self, TransportError> {
        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(TransportError::InvalidConfiguration(format!(
                    "unsupported data bits: {}",
                    other
                )))
            }
        };

        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let parity = match config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let flow_control = match config.flow_control {
            SerialFlowControl::Hardware => FlowControl::Hardware,
            SerialFlowControl::Software => FlowControl::Software,
            SerialFlowControl::None => FlowControl::None,
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    TransportError::PortNotFound(config.port.clone())
                }
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    TransportError::PermissionDenied(config.port.clone())
                }
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    TransportError::PortNotFound(config.port.clone())
                }
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        tracing::info!("Opened {} @ {} baud", config.port, config.baud_rate);

        Ok(Self {
            config,
            port,
            rx: VecDeque::with_capacity(256),
            stats: TransportStats::default(),
        })
    }

    /// Configuration this transport was opened with
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Move whatever the OS has buffered into the local queue
    fn fill(&mut self) -> Result<(), TransportError> {
        let pending = self.port.bytes_to_read().map_err(serial_io_error)? as usize;
        if pending == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; pending];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                self.rx.extend(&chunk[..n]);
                self.stats.bytes_received += n as u64;
                Ok(())
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(()),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }
}

fn serial_io_error(e: serialport::Error) -> TransportError {
    TransportError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e))
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.stats.bytes_sent += data.len() as u64;
        self.stats.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.port.flush()?;
        Ok(())
    }

    fn available(&mut self) -> Result<usize, TransportError> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        Ok(self.rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        if self.rx.is_empty() {
            self.fill()?;
        }
        Ok(self.rx.pop_front())
    }

    fn purge(&mut self) -> Result<usize, TransportError> {
        self.port.flush()?;
        self.fill()?;
        let dropped = self.rx.len();
        self.rx.clear();
        self.port.clear(ClearBuffer::Input).map_err(serial_io_error)?;
        self.stats.bytes_purged += dropped as u64;
        Ok(dropped)
    }

    fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{} {})",
            self.config.port,
            self.config.baud_rate,
            self.config.data_bits,
            match self.config.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.config.stop_bits,
            match self.config.flow_control {
                SerialFlowControl::None => "No FC",
                SerialFlowControl::Hardware => "HW FC",
                SerialFlowControl::Software => "SW FC",
            }
        )
    }

    fn stats(&self) -> TransportStats {
        self.stats.clone()
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(serial_io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_from_str() {
        assert_eq!("E".parse::<SerialParity>().unwrap(), SerialParity::Even);
        assert_eq!("none".parse::<SerialParity>().unwrap(), SerialParity::None);
        assert!("mark".parse::<SerialParity>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = SerialConfig::new("/dev/ttyS1", 115_200)
            .parity(SerialParity::Odd)
            .stop_bits(2)
            .flow_control(SerialFlowControl::Hardware);
        assert_eq!(config.port, "/dev/ttyS1");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 2);
        assert_eq!(config.parity, SerialParity::Odd);
    }

    #[test]
    fn test_default_baud_is_sim808_safe() {
        assert_eq!(SerialConfig::default().baud_rate, 9600);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::open(SerialConfig::new("/dev/does-not-exist-sim808", 9600));
        assert!(result.is_err());
    }
}
